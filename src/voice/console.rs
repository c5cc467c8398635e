//! Terminal stand-ins for a microphone and a speaker
//!
//! Each non-empty input line is one final transcript; spoken feedback is
//! printed.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::{mpsc, oneshot};

use super::capture::{RecognitionError, RecognitionEvent, SpeechRecognizer};
use super::synth::{SpeechOptions, SpeechOutput};
use super::Transcript;
use crate::Result;

type LineReader = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// Reads typed commands as if they were spoken
pub struct ConsoleRecognizer {
    lines: Arc<tokio::sync::Mutex<LineReader>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl ConsoleRecognizer {
    /// Read from standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Read from any async source
    #[must_use]
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let boxed: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            lines: Arc::new(tokio::sync::Mutex::new(BufReader::new(boxed).lines())),
            stop: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for ConsoleRecognizer {
    async fn start(
        &self,
        _language: &str,
    ) -> std::result::Result<mpsc::Receiver<RecognitionEvent>, RecognitionError> {
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = Some(stop_tx);

        let lines = Arc::clone(&self.lines);
        tokio::spawn(async move {
            let mut lines = lines.lock().await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = tx.send(RecognitionEvent::End).await;
                        break;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let text = line.trim();
                            if text.is_empty() {
                                continue;
                            }
                            let event = RecognitionEvent::Result(Transcript::final_result(text, 1.0));
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            let _ = tx
                                .send(RecognitionEvent::Error(RecognitionError::AudioCapture(
                                    "input closed".to_string(),
                                )))
                                .await;
                            break;
                        }
                        Err(e) => {
                            let _ = tx
                                .send(RecognitionEvent::Error(RecognitionError::AudioCapture(
                                    e.to_string(),
                                )))
                                .await;
                            break;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn stop(&self) {
        let stop = self.stop.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
    }
}

/// Prints feedback instead of speaking it
#[derive(Debug, Default)]
pub struct ConsoleSpeechOutput;

#[async_trait]
impl SpeechOutput for ConsoleSpeechOutput {
    async fn speak(&self, text: &str, _options: SpeechOptions) -> Result<()> {
        println!("  > {text}");
        Ok(())
    }

    fn cancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_become_final_transcripts() {
        let input: &'static [u8] = b"create task buy milk\n\n  list tasks  \n";
        let recognizer = ConsoleRecognizer::from_reader(input);
        let mut rx = recognizer.start("en-US").await.unwrap();

        let mut texts = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                RecognitionEvent::Result(t) => texts.push(t.text),
                RecognitionEvent::Error(e) => {
                    assert!(e.is_fatal());
                    break;
                }
                RecognitionEvent::End => break,
            }
        }

        assert_eq!(texts, vec!["create task buy milk", "list tasks"]);
    }
}

//! Capture + analyze pipeline shared by the overlay, the web server and `once` mode.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::info;

use crate::capture::{self, ScreenGrabber};
use crate::error::HintError;
use crate::gemini::InferenceClient;
use crate::hint::AnalysisResult;

pub struct Scanner {
    grabber: Arc<dyn ScreenGrabber>,
    client: Mutex<InferenceClient>,
}

impl Scanner {
    pub fn new(grabber: Arc<dyn ScreenGrabber>, client: InferenceClient) -> Self {
        Self {
            grabber,
            client: Mutex::new(client),
        }
    }

    /// Captures the screen and asks the model for a hint.
    /// Scans are serialised on the client lock, so the key index has a single writer.
    pub async fn scan(&self) -> Result<AnalysisResult, HintError> {
        let start = Instant::now();

        let grabber = Arc::clone(&self.grabber);
        let png = tokio::task::spawn_blocking(move || {
            let frame = grabber.grab()?;
            capture::encode_png(&frame)
        })
        .await
        .map_err(|e| HintError::Capture(format!("Capture task failed: {}", e)))??;

        let result = self.client.lock().await.analyze(&png).await?;
        info!("Scan finished in {:?}", start.elapsed());
        Ok(result)
    }
}

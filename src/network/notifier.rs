use reqwest::{header, Client, StatusCode};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::{error, info, warn};

use crate::{
    config::NotifyConfig,
    dial::{DigitEvent, DigitSink},
};

use super::{NotifyError, ServiceCall};

const DIGIT_PLACEHOLDER: &str = "{digit}";

/// Where a digit gets delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyTarget {
    url: String,
    token: Option<String>,
    entity_id: Option<String>,
}

impl NotifyTarget {
    pub fn url_for(&self, digit: u8) -> String {
        self.url.replace(DIGIT_PLACEHOLDER, &digit.to_string())
    }

    pub fn body_for(&self, digit: u8) -> ServiceCall {
        ServiceCall {
            entity_id: self
                .entity_id
                .as_ref()
                .map(|entity_id| entity_id.replace(DIGIT_PLACEHOLDER, &digit.to_string())),
        }
    }
}

impl From<&NotifyConfig> for NotifyTarget {
    fn from(config: &NotifyConfig) -> Self {
        NotifyTarget {
            url: config.url.clone(),
            token: config.token.clone(),
            entity_id: config.entity_id.clone(),
        }
    }
}

/// Delivers completed digits off the decoder's task. One attempt per digit.
pub struct Notifier {
    delivery: Option<(Client, NotifyTarget)>,
    digit_receiver: Receiver<DigitEvent>,
}

impl Notifier {
    pub fn create(
        config: Option<&NotifyConfig>,
        capacity: usize,
    ) -> Result<(Notifier, NotifierHandle), NotifyError> {
        let (digit_sender, digit_receiver) = mpsc::channel(capacity);

        let delivery = match config {
            Some(config) => {
                let client = Client::builder()
                    .timeout(config.timeout)
                    .build()
                    .map_err(NotifyError::Client)?;
                Some((client, NotifyTarget::from(config)))
            }
            None => None,
        };

        let notifier = Notifier {
            delivery,
            digit_receiver,
        };

        Ok((notifier, NotifierHandle { digit_sender }))
    }

    pub async fn run(&mut self) {
        while let Some(event) = self.digit_receiver.recv().await {
            let Some((client, target)) = &self.delivery else {
                info!(digit = event.value, "dialed");
                continue;
            };

            match deliver(client, target, event.value).await {
                Ok(status) => info!(digit = event.value, %status, "notification delivered"),
                Err(e) => error!(digit = event.value, "notification failed: {}", e),
            }
        }
    }
}

async fn deliver(
    client: &Client,
    target: &NotifyTarget,
    digit: u8,
) -> Result<StatusCode, NotifyError> {
    let mut request = client.post(target.url_for(digit)).json(&target.body_for(digit));

    if let Some(token) = &target.token {
        request = request.header(header::AUTHORIZATION, token);
    }

    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        Ok(status)
    } else {
        Err(NotifyError::Status(status))
    }
}

/// The decoder's side of the notifier: enqueue and move on.
#[derive(Debug, Clone)]
pub struct NotifierHandle {
    digit_sender: Sender<DigitEvent>,
}

impl DigitSink for NotifierHandle {
    fn on_digit_complete(&mut self, event: DigitEvent) {
        match self.digit_sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(digit = event.value, "notifier busy, dropping digit")
            }
            Err(TrySendError::Closed(event)) => {
                warn!(digit = event.value, "notifier stopped, dropping digit")
            }
        }
    }
}

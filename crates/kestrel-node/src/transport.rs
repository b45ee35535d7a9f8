use std::collections::HashMap;

use kestrel_core::Address;
use kestrel_rpc::MessageRequest;
use kestrel_server::Transport;
use tracing::{debug, trace, warn};

/// Pushes consensus messages to peers' `/consensus/message` endpoint.
///
/// Each delivery runs on its own task so the consensus loop never waits on
/// the network.
pub struct HttpTransport {
    client: reqwest::Client,
    sender: Address,
    peers: HashMap<Address, String>,
}

impl HttpTransport {
    pub fn new(sender: Address, peers: Vec<(Address, String)>) -> Self {
        let peers = peers
            .into_iter()
            .map(|(address, endpoint)| {
                let url = format!("{}/consensus/message", endpoint.trim_end_matches('/'));
                (address, url)
            })
            .collect();

        HttpTransport {
            client: reqwest::Client::new(),
            sender,
            peers,
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, targets: &[Address], payload: Vec<u8>) {
        let request = MessageRequest {
            payload: hex::encode(&payload),
            sender: Some(self.sender),
        };

        for target in targets {
            let Some(url) = self.peers.get(target) else {
                trace!("No endpoint for verifier {}", target);
                continue;
            };

            let client = self.client.clone();
            let url = url.clone();
            let request = request.clone();
            let target = *target;
            tokio::spawn(async move {
                match client.post(&url).json(&request).send().await {
                    Ok(response) if !response.status().is_success() => {
                        debug!("Verifier {} rejected message: {}", target, response.status());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to reach verifier {}: {}", target, e),
                }
            });
        }
    }
}

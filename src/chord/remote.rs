//! Remote node proxy.
//!
//! `RemoteNode` is a thin HTTP client bound to one peer, exposing exactly
//! the node-to-node operations of the ring protocol. Every call carries a
//! bounded deadline; a peer that cannot be reached within it surfaces as
//! `ChordError::PeerUnreachable`, kept distinct from protocol-level
//! outcomes like a missing blob.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::ChordError;
use crate::ring::Finger;

use super::protocol::*;

/// Deadline for single-hop pointer operations.
pub const RPC_TIMEOUT: Duration = Duration::from_millis(500);
/// Deadline for operations that may themselves hop around the ring
/// (routing queries) or carry blob payloads.
pub const ROUTING_TIMEOUT: Duration = Duration::from_secs(5);

/// Factory for remote node handles; one per process, cloned freely so all
/// handles share the underlying connection pool.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    timeout: Duration,
    routing_timeout: Duration,
}

impl NodeClient {
    pub fn new() -> Self {
        Self::with_timeouts(RPC_TIMEOUT, ROUTING_TIMEOUT)
    }

    pub fn with_timeouts(timeout: Duration, routing_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
            routing_timeout,
        }
    }

    /// Bind a handle to one peer. Cheap; no connection is made until a call.
    pub fn open(&self, finger: Finger) -> RemoteNode {
        RemoteNode {
            finger,
            http: self.http.clone(),
            timeout: self.timeout,
            routing_timeout: self.routing_timeout,
        }
    }
}

impl Default for NodeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability handle for one remote ring member.
pub struct RemoteNode {
    finger: Finger,
    http: reqwest::Client,
    timeout: Duration,
    routing_timeout: Duration,
}

impl RemoteNode {
    pub fn finger(&self) -> Finger {
        self.finger
    }

    fn url(&self, endpoint: &str) -> String {
        format!("http://{}{}", self.finger.addr, endpoint)
    }

    fn unreachable(&self) -> ChordError {
        ChordError::PeerUnreachable(self.finger.addr)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<T, ChordError> {
        let response = self
            .http
            .get(self.url(endpoint))
            .timeout(timeout)
            .send()
            .await
            .map_err(|_| self.unreachable())?;
        if !response.status().is_success() {
            return Err(self.unreachable());
        }
        response.json().await.map_err(|_| self.unreachable())
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, ChordError> {
        let response = self
            .http
            .post(self.url(endpoint))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|_| self.unreachable())?;
        if !response.status().is_success() {
            return Err(self.unreachable());
        }
        response.json().await.map_err(|_| self.unreachable())
    }

    pub async fn get_location(&self) -> Result<Finger, ChordError> {
        let response: FingerResponse = self.get_json(ENDPOINT_LOCATION, self.timeout).await?;
        Ok(response.finger)
    }

    pub async fn get_shard_id(&self) -> Result<u32, ChordError> {
        let response: ShardIdResponse = self.get_json(ENDPOINT_SHARD_ID, self.timeout).await?;
        Ok(response.shard_id)
    }

    pub async fn get_successor(&self) -> Result<Finger, ChordError> {
        let response: FingerResponse = self.get_json(ENDPOINT_SUCCESSOR, self.timeout).await?;
        Ok(response.finger)
    }

    pub async fn get_predecessor(&self) -> Result<Option<Finger>, ChordError> {
        let response: OptionalFingerResponse =
            self.get_json(ENDPOINT_PREDECESSOR, self.timeout).await?;
        Ok(response.finger)
    }

    pub async fn set_predecessor(&self, predecessor: Finger) -> Result<(), ChordError> {
        let _: AckResponse = self
            .put_json(
                ENDPOINT_PREDECESSOR,
                &SetPredecessorRequest { predecessor },
            )
            .await?;
        Ok(())
    }

    pub async fn notify_predecessor(&self, candidate: Finger) -> Result<(), ChordError> {
        let _: AckResponse = self
            .post_json(ENDPOINT_NOTIFY, &NotifyRequest { candidate }, self.timeout)
            .await?;
        Ok(())
    }

    pub async fn find_successor(&self, identifier: u32) -> Result<Finger, ChordError> {
        let response: OptionalFingerResponse = self
            .post_json(
                ENDPOINT_FIND_SUCCESSOR,
                &FindRequest { identifier },
                self.routing_timeout,
            )
            .await?;
        response.finger.ok_or_else(|| self.unreachable())
    }

    pub async fn find_predecessor(&self, identifier: u32) -> Result<Finger, ChordError> {
        let response: OptionalFingerResponse = self
            .post_json(
                ENDPOINT_FIND_PREDECESSOR,
                &FindRequest { identifier },
                self.routing_timeout,
            )
            .await?;
        response.finger.ok_or_else(|| self.unreachable())
    }

    pub async fn closest_preceding_finger(&self, identifier: u32) -> Result<Finger, ChordError> {
        let response: FingerResponse = self
            .post_json(
                ENDPOINT_CLOSEST_PRECEDING,
                &FindRequest { identifier },
                self.routing_timeout,
            )
            .await?;
        Ok(response.finger)
    }

    pub async fn get_finger_table(&self) -> Result<Vec<Finger>, ChordError> {
        let response: FingerTableResponse =
            self.get_json(ENDPOINT_FINGER_TABLE, self.timeout).await?;
        Ok(response.fingers)
    }

    pub async fn refresh_successors(&self, nodes_left: u32) -> Result<(), ChordError> {
        let _: AckResponse = self
            .post_json(
                ENDPOINT_REFRESH_SUCCESSORS,
                &RefreshSuccessorsRequest { nodes_left },
                self.routing_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn remove_node(
        &self,
        node: Finger,
        index: usize,
        replacement: Finger,
        hops_remaining: u32,
    ) -> Result<(), ChordError> {
        let _: AckResponse = self
            .post_json(
                ENDPOINT_REMOVE_NODE,
                &RemoveNodeRequest {
                    node,
                    index,
                    replacement,
                    hops_remaining,
                },
                self.routing_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn replicate_file(&self, data: &[u8], hops_remaining: u32) -> Result<(), ChordError> {
        let _: AckResponse = self
            .post_json(
                ENDPOINT_REPLICATE,
                &ReplicateFileRequest {
                    data_hex: hex::encode(data),
                    hops_remaining,
                },
                self.routing_timeout,
            )
            .await?;
        Ok(())
    }

    /// Fetch a blob from this peer. `Ok(None)` means the peer is reachable
    /// but holds no copy, which callers treat very differently from an
    /// unreachable peer.
    pub async fn get_file(&self, content_id: &str) -> Result<Option<Vec<u8>>, ChordError> {
        let response = self
            .http
            .get(self.url(&format!("{ENDPOINT_FILE}/{content_id}")))
            .timeout(self.routing_timeout)
            .send()
            .await
            .map_err(|_| self.unreachable())?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.unreachable());
        }
        let body: FileResponse = response.json().await.map_err(|_| self.unreachable())?;
        match body.data_hex {
            Some(data_hex) => {
                let bytes = hex::decode(data_hex).map_err(|_| self.unreachable())?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ChordError> {
        let response = self
            .http
            .put(self.url(endpoint))
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|_| self.unreachable())?;
        if !response.status().is_success() {
            return Err(self.unreachable());
        }
        response.json().await.map_err(|_| self.unreachable())
    }
}

//! JSON-RPC client for a Hive API node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use silentbot_core::{AccountInterests, ContentRef, Error, Result};

use crate::capacity::Manabar;
use crate::gateway::{CapacityOracle, LedgerGateway, MAX_BLOCK_BATCH};
use crate::signing::{Signer, TransactionHeader};
use crate::types::{parse_chain_time, Action, Block, BroadcastOutcome, PostInfo};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const FOLLOW_PAGE: usize = 1000;

/// Gateway and capacity oracle backed by a public API node.
pub struct HiveClient {
    http: Client,
    node: String,
    signer: Signer,
    next_id: AtomicU64,
}

impl HiveClient {
    pub fn new(node: &str, signer: Signer) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            node: node.to_string(),
            signer,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// One JSON-RPC 2.0 call. Node-side errors become `Error::Rejected`.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        debug!("RPC {} #{} -> {}", method, id, self.node);

        let response = self
            .http
            .post(&self.node)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "{}: HTTP {}",
                method,
                response.status()
            )));
        }

        let mut reply: Value = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", method, e)))?;

        if let Some(error) = reply.get("error") {
            let message = error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(Error::Rejected(message));
        }
        Ok(reply["result"].take())
    }

    async fn global_properties(&self) -> Result<Value> {
        self.call("condenser_api.get_dynamic_global_properties", json!([]))
            .await
    }

    async fn following(&self, account: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut start = String::new();
        loop {
            let page = self
                .call(
                    "condenser_api.get_following",
                    json!([account, start, "blog", FOLLOW_PAGE]),
                )
                .await?;
            let entries = page.as_array().cloned().unwrap_or_default();
            let full = entries.len() == FOLLOW_PAGE;
            for entry in entries {
                if let Some(name) = entry["following"].as_str() {
                    // pages overlap on their first entry
                    if name != start {
                        names.push(name.to_string());
                    }
                }
            }
            match names.last() {
                Some(last) if full && *last != start => start = last.clone(),
                _ => return Ok(names),
            }
        }
    }
}

impl LedgerGateway for HiveClient {
    async fn head_height(&self) -> Result<u64> {
        self.global_properties().await?["head_block_number"]
            .as_u64()
            .ok_or_else(|| Error::Malformed("missing head_block_number".into()))
    }

    async fn block_range(&self, start: u64, count: u64) -> Result<Vec<Block>> {
        let count = count.min(MAX_BLOCK_BATCH);
        let mut result = self
            .call(
                "block_api.get_block_range",
                json!({"starting_block_num": start, "count": count}),
            )
            .await?;
        Ok(serde_json::from_value(result["blocks"].take())?)
    }

    async fn get_post(&self, target: &ContentRef) -> Result<Option<PostInfo>> {
        match self
            .call(
                "bridge.get_post",
                json!({"author": target.author, "permlink": target.permlink}),
            )
            .await
        {
            Ok(Value::Null) => Ok(None),
            Ok(post) => PostInfo::from_bridge(&post).map(Some),
            Err(Error::Rejected(message)) if message.contains("does not exist") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn content_exists(&self, target: &ContentRef) -> Result<bool> {
        let content = self
            .call(
                "condenser_api.get_content",
                json!([target.author, target.permlink]),
            )
            .await?;
        Ok(content["author"].as_str().is_some_and(|a| !a.is_empty()))
    }

    async fn account_interests(&self, account: &str) -> Result<AccountInterests> {
        let blacklisted = self
            .call(
                "bridge.get_follow_list",
                json!({"observer": account, "follow_type": "blacklisted"}),
            )
            .await?;
        let subscriptions = self
            .call("bridge.list_all_subscriptions", json!({"account": account}))
            .await?;

        Ok(AccountInterests {
            following: self.following(account).await?.into_iter().collect(),
            subscriptions: subscriptions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|s| s[0].as_str().map(str::to_string))
                .collect(),
            blacklist: blacklisted
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|b| b["name"].as_str().map(str::to_string))
                .collect(),
        })
    }

    async fn broadcast(&self, action: &Action) -> Result<BroadcastOutcome> {
        let props = self.global_properties().await?;
        let head_block = props["head_block_number"]
            .as_u64()
            .ok_or_else(|| Error::Malformed("missing head_block_number".into()))?;
        let head_id = props["head_block_id"]
            .as_str()
            .ok_or_else(|| Error::Malformed("missing head_block_id".into()))?;
        let head_time = props["time"]
            .as_str()
            .and_then(parse_chain_time)
            .ok_or_else(|| Error::Malformed("missing node time".into()))?;

        let header = TransactionHeader::new(head_block, head_id, head_time)?;
        let tx = self.signer.sign(&header, action)?;

        match self
            .call("condenser_api.broadcast_transaction", json!([tx]))
            .await
        {
            Ok(_) => Ok(BroadcastOutcome::Accepted),
            Err(Error::Rejected(message)) if message.contains("identical") => {
                debug!("{} by {} already on chain", action.name(), action.signer());
                Ok(BroadcastOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }
}

impl CapacityOracle for HiveClient {
    async fn capacity(&self, account: &str) -> Result<f64> {
        let accounts = self
            .call("condenser_api.get_accounts", json!([[account]]))
            .await?;
        let entry = accounts
            .get(0)
            .ok_or_else(|| Error::Malformed(format!("unknown account {}", account)))?;
        let bar = Manabar::from_account(entry)?;
        Ok(bar.percentage(chrono::Utc::now().timestamp()))
    }
}

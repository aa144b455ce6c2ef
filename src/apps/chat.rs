// src/apps/chat.rs
// The default in-process chat app (spec §1 "chat" app, §4.F step 6 fallback).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, SynapseError};
use crate::store::{AddResponseRequest, ConversationStore};

use super::{App, AppMessage};

pub const CHAT_APP_ID: &str = "chat";

/// Shape of `AppMessage::content` sent by the loop for a `respond` action
/// (spec §4.F step 6): `{requestId, response, energyLevel, modelUsed, energyConsumed}`.
/// `energyConsumed` is already reflected in the conversation's
/// `total_energy_consumed` by the time this arrives, so it is decoded by
/// callers that need it (e.g. an `http` app forwarding the raw payload) but
/// not read here.
#[derive(Debug, Deserialize)]
struct RespondPayload {
    #[serde(rename = "requestId")]
    request_id: String,
    response: String,
    #[serde(rename = "energyLevel")]
    energy_level: f64,
    #[serde(rename = "modelUsed")]
    model_used: Option<String>,
}

pub struct ChatApp {
    store: Arc<dyn ConversationStore>,
}

impl ChatApp {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl App for ChatApp {
    fn app_id(&self) -> &str {
        CHAT_APP_ID
    }

    async fn receive_message(&self, msg: AppMessage) -> Result<()> {
        let payload: RespondPayload = serde_json::from_value(msg.content).map_err(|e| {
            warn!("[chat] malformed respond payload: {}", e);
            SynapseError::BadRequest(format!("malformed respond payload: {e}"))
        })?;

        self.store
            .add_response(AddResponseRequest {
                request_id: payload.request_id,
                response_text: Some(payload.response),
                energy_level: payload.energy_level,
                model_used: payload.model_used,
                energy_charge: 0.0,
                ..Default::default()
            })
            .await
    }
}

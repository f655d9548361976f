use serde::{Deserialize, Serialize};

use crate::resolver::ResolutionResult;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub key: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBatchRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterBatchResponse {
    pub registered: usize,
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetValueResponse {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub url: String,
    pub value: Option<String>,
    pub detail: ResolutionResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub affected: u64,
}

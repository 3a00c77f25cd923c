#[derive(Debug, Deserialize)]
struct ObfuscateKeyRequest {
    #[serde(default)]
    key: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ObfuscateKeyResponse {
    obfuscated: String,
}

#[derive(Debug, Deserialize)]
struct DeobfuscateKeyRequest {
    #[serde(default)]
    obfuscated: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct DeobfuscateKeyResponse {
    key: String,
}

fn map_obfuscate_error(err: ObfuscateError) -> Response {
    match err {
        ObfuscateError::InvalidKeyFormat => key_error("Invalid key format"),
    }
}

/// Malformed JSON is a bad request; a missing or non-string key is an
/// invalid key format.
async fn handle_obfuscate_key(body: Bytes) -> Response {
    let Ok(payload) = serde_json::from_slice::<ObfuscateKeyRequest>(&body) else {
        return key_error("Bad Request");
    };
    let result = payload
        .key
        .as_str()
        .ok_or(ObfuscateError::InvalidKeyFormat)
        .and_then(obfuscate::obfuscate_key);
    match result {
        Ok(obfuscated) => Json(ObfuscateKeyResponse { obfuscated }).into_response(),
        Err(err) => map_obfuscate_error(err),
    }
}

async fn handle_deobfuscate_key(body: Bytes) -> Response {
    let Ok(payload) = serde_json::from_slice::<DeobfuscateKeyRequest>(&body) else {
        return key_error("Bad Request");
    };
    let result = payload
        .obfuscated
        .as_str()
        .ok_or(ObfuscateError::InvalidKeyFormat)
        .and_then(obfuscate::deobfuscate_key);
    match result {
        Ok(key) => Json(DeobfuscateKeyResponse { key }).into_response(),
        Err(err) => map_obfuscate_error(err),
    }
}

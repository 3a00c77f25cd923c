/// `ANY /{provider}/{...endpoint}`: resolve, transcode, forward, render.
async fn handle_proxy(State(state): State<RelayHttpState>, request: Request) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();

    let target = match state
        .providers
        .resolve_path(parts.uri.path(), parts.uri.query())
    {
        Ok(target) => target,
        Err(err) => {
            tracing::debug!(path = parts.uri.path(), "rejecting unsupported provider");
            return map_gateway_error(err);
        }
    };

    let method = parts.method;
    let mut headers = parts.headers;
    let outcome = match transcode_request(&method, &headers, body, state.max_body_bytes).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(provider = %target.provider, error = %err, "failed to read request body");
            return map_gateway_error(err);
        }
    };
    let transcoded = outcome.was_transcoded();

    upstream::sanitize_request_headers(&mut headers);
    let upstream_body = match outcome {
        TranscodeOutcome::Transcoded { body, content_type } => {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            // Rendered replies are parsed here and reqwest is built without decoders.
            headers.remove(header::ACCEPT_ENCODING);
            Some(reqwest::Body::from(body))
        }
        TranscodeOutcome::Passthrough { body } => body.map(|body| {
            let data_stream = body
                .into_data_stream()
                .map(|result| result.map_err(|err| std::io::Error::other(err.to_string())));
            reqwest::Body::wrap_stream(data_stream)
        }),
    };

    let upstream_url_no_query = target.url_without_query();
    tracing::debug!(
        method = %method,
        provider = %target.provider,
        upstream_url = upstream_url_no_query,
        transcoded,
        "forwarding request"
    );

    let upstream_response = match state
        .upstream
        .send(method.clone(), &target.url, headers, upstream_body)
        .await
    {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                method = %method,
                provider = %target.provider,
                upstream_url = upstream_url_no_query,
                error = %err,
                "upstream call failed"
            );
            return map_gateway_error(err);
        }
    };

    let status = upstream_response.status();
    let response = if transcoded {
        render_xml_response(upstream_response, state.max_body_bytes).await
    } else {
        passthrough_response(upstream_response)
    };

    tracing::info!(
        method = %method,
        provider = %target.provider,
        transcoded,
        upstream_status = status.as_u16(),
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "proxied request"
    );
    response
}

/// GET and HEAD never carry a body. Form bodies are buffered and rewritten;
/// everything else is handed on as a stream.
async fn transcode_request(
    method: &Method,
    headers: &HeaderMap,
    body: Body,
    max_body_bytes: usize,
) -> Result<TranscodeOutcome<Option<Body>>, GatewayError> {
    if method == Method::GET || method == Method::HEAD {
        return Ok(TranscodeOutcome::Passthrough { body: None });
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    if !transcode::is_form_content_type(content_type) {
        return Ok(TranscodeOutcome::Passthrough { body: Some(body) });
    }

    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > max_body_bytes) {
        return Err(GatewayError::BodyTooLarge {
            limit: max_body_bytes,
        });
    }

    let form = read_request_body_bounded(body, max_body_bytes).await?;
    let json = transcode::transcode_form_body(&form).map_err(|err| GatewayError::InvalidRequest {
        reason: format!("failed to encode chat request: {err}"),
    })?;
    Ok(TranscodeOutcome::Transcoded {
        body: json,
        content_type: JSON_CONTENT_TYPE,
    })
}

/// Buffers a client body, failing with `BodyTooLarge` once it passes `max_bytes`
/// whether or not a `content-length` was declared.
async fn read_request_body_bounded(body: Body, max_bytes: usize) -> Result<Bytes, GatewayError> {
    let mut stream = body.into_data_stream();
    let mut buffered = bytes::BytesMut::new();
    while let Some(next) = stream.next().await {
        let chunk = next.map_err(|err| GatewayError::InvalidRequest {
            reason: format!("failed to read request body: {err}"),
        })?;
        if buffered.len().saturating_add(chunk.len()) > max_bytes {
            return Err(GatewayError::BodyTooLarge { limit: max_bytes });
        }
        buffered.extend_from_slice(chunk.as_ref());
    }
    Ok(buffered.freeze())
}

/// Status, headers and body stream of the upstream response, unbuffered.
fn passthrough_response(upstream_response: reqwest::Response) -> Response {
    let status = upstream_response.status();
    let mut headers = upstream_response.headers().clone();
    upstream::sanitize_response_headers(&mut headers);

    let stream = upstream_response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Always 200 with the `<chat>` document; the upstream status is not relayed.
async fn render_xml_response(upstream_response: reqwest::Response, max_body_bytes: usize) -> Response {
    let body = match upstream::read_body_bounded(upstream_response, max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read upstream body for rendering");
            return map_gateway_error(err);
        }
    };

    let messages = render::extract_messages(&body);
    if messages.is_empty() {
        tracing::debug!(bytes = body.len(), "upstream response had no choices");
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        render::render_chat_xml(&messages),
    )
        .into_response()
}

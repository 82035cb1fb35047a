// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File download responses.
//!
//! Real and decoy payloads leave through the same function so the two are
//! indistinguishable on the wire apart from their bytes and filename.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::engine::Payload;

pub fn payload_response(payload: Payload) -> Response {
    let disposition = content_disposition(&payload.filename);
    let length = payload.bytes.len();

    let mut response = (StatusCode::OK, Body::from(payload.bytes)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// `attachment` with an ASCII fallback and an RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayloadClass;
    use axum::body::to_bytes;

    fn payload(class: PayloadClass, filename: &str) -> Payload {
        Payload {
            class,
            filename: filename.to_string(),
            bytes: b"contents".to_vec(),
        }
    }

    #[tokio::test]
    async fn sets_download_headers() {
        let response = payload_response(payload(PayloadClass::Real, "report.pdf"));
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert_eq!(headers[header::CONTENT_LENGTH], "8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"contents");
    }

    #[test]
    fn real_and_decoy_share_header_names() {
        let real = payload_response(payload(PayloadClass::Real, "a.pdf"));
        let decoy = payload_response(payload(PayloadClass::Decoy, "a.pdf"));
        let names = |r: &Response| {
            let mut n: Vec<String> = r.headers().keys().map(|k| k.to_string()).collect();
            n.sort();
            n
        };
        assert_eq!(names(&real), names(&decoy));
        assert_eq!(real.headers(), decoy.headers());
    }

    #[test]
    fn escapes_unsafe_filenames() {
        assert_eq!(
            content_disposition("q\"1 résumé.pdf"),
            "attachment; filename=\"q_1 r_sum_.pdf\"; filename*=UTF-8''q%221%20r%C3%A9sum%C3%A9.pdf"
        );
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payload selection for a resolved access.
//!
//! `allow` opens the real blob and consumes one download unit; `decoy`
//! opens the decoy blob, never touches the counter and tags the attempt
//! with a verification code. Both return the same [`Payload`] shape.
//! Every resolved access is written to the attempt trail before anything
//! leaves the engine: allow, decoy, OTP failure, and a payload that could
//! not be opened. A real download and its attempt commit together.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::crypto::codes::{token_prefix, verification_code};
use crate::models::{AccessAttempt, FileAsset, PayloadClass, ServedPayload, ShareLink};

use super::audit_log::AttemptWriter;
use super::error::{EngineError, EngineResult};
use super::files::{FileCatalog, Payload};
use super::registry::LinkRegistry;
use super::verifier::{DenyReason, Granted, Resolution};

#[derive(Clone)]
pub struct DeceptionResolver {
    files: FileCatalog,
    links: LinkRegistry,
    attempts: AttemptWriter,
    clock: Arc<dyn Clock>,
}

struct AttemptDraft<'a> {
    link: &'a ShareLink,
    asset: &'a FileAsset,
    password_correct: Option<bool>,
    served: ServedPayload,
    verification_code: Option<String>,
    otp_verified: Option<bool>,
}

impl DeceptionResolver {
    pub fn new(
        files: FileCatalog,
        links: LinkRegistry,
        attempts: AttemptWriter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            files,
            links,
            attempts,
            clock,
        }
    }

    /// Produce the payload for `resolution`, recording the attempt.
    pub async fn resolve(&self, resolution: Resolution, client_ip: &str) -> EngineResult<Payload> {
        match resolution {
            Resolution::Deny(DenyReason::LinkInvalid) => Err(EngineError::NotFound("link")),
            Resolution::Deny(DenyReason::InvalidOtp { link, asset }) => {
                // The password is never compared once the OTP has failed.
                let attempt = self.attempt(
                    AttemptDraft {
                        link: &link,
                        asset: &asset,
                        password_correct: None,
                        served: ServedPayload::None,
                        verification_code: None,
                        otp_verified: Some(false),
                    },
                    client_ip,
                );
                self.attempts.record(&attempt, &asset)?;
                info!(token = token_prefix(&link.token), ip = %client_ip, "OTP verification failed");
                Err(EngineError::InvalidOtp)
            }
            Resolution::Allow(granted) => self.serve_real(granted, client_ip).await,
            Resolution::Decoy(granted) => self.serve_decoy(granted, client_ip).await,
        }
    }

    async fn serve_real(&self, granted: Granted, client_ip: &str) -> EngineResult<Payload> {
        let Granted {
            link,
            asset,
            otp_verified,
        } = granted;

        // Open first: a vault failure must not cost a download unit.
        let payload = match self.files.read_payload(&asset, PayloadClass::Real).await {
            Ok(payload) => payload,
            Err(e) => return self.unserved(&link, &asset, true, otp_verified, client_ip, e),
        };

        let attempt = self.attempt(
            AttemptDraft {
                link: &link,
                asset: &asset,
                password_correct: Some(true),
                served: ServedPayload::Real,
                verification_code: None,
                otp_verified,
            },
            client_ip,
        );
        let link = self.links.register_successful_download(&attempt)?;
        self.attempts.alert(&attempt, &asset);

        info!(
            token = token_prefix(&link.token),
            file_id = %asset.id,
            downloads_consumed = link.downloads_consumed,
            download_limit = link.download_limit,
            "Real file served"
        );
        Ok(payload)
    }

    async fn serve_decoy(&self, granted: Granted, client_ip: &str) -> EngineResult<Payload> {
        let Granted {
            link,
            asset,
            otp_verified,
        } = granted;

        let payload = match self.files.read_payload(&asset, PayloadClass::Decoy).await {
            Ok(payload) => payload,
            Err(e) => return self.unserved(&link, &asset, false, otp_verified, client_ip, e),
        };
        let code = verification_code();

        let attempt = self.attempt(
            AttemptDraft {
                link: &link,
                asset: &asset,
                password_correct: Some(false),
                served: ServedPayload::Decoy,
                verification_code: Some(code.clone()),
                otp_verified,
            },
            client_ip,
        );
        self.attempts.record(&attempt, &asset)?;

        warn!(
            token = token_prefix(&link.token),
            file_id = %asset.id,
            ip = %client_ip,
            verification_code = %code,
            "Intrusion: wrong password, decoy served"
        );
        Ok(payload)
    }

    /// The password was compared but no payload could be opened. The
    /// attempt is still recorded, with nothing served, and the original
    /// error is returned.
    fn unserved(
        &self,
        link: &ShareLink,
        asset: &FileAsset,
        password_correct: bool,
        otp_verified: Option<bool>,
        client_ip: &str,
        cause: EngineError,
    ) -> EngineResult<Payload> {
        error!(
            token = token_prefix(&link.token),
            file_id = %asset.id,
            password_correct,
            error = %cause,
            "Payload could not be opened"
        );
        let attempt = self.attempt(
            AttemptDraft {
                link,
                asset,
                password_correct: Some(password_correct),
                served: ServedPayload::None,
                verification_code: None,
                otp_verified,
            },
            client_ip,
        );
        self.attempts.record(&attempt, asset)?;
        Err(cause)
    }

    fn attempt(&self, draft: AttemptDraft<'_>, client_ip: &str) -> AccessAttempt {
        AccessAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            link_token: draft.link.token.clone(),
            file_id: draft.asset.id.clone(),
            filename: draft.asset.filename.clone(),
            owner_id: draft.asset.owner_id.clone(),
            attempted_at: self.clock.now(),
            password_correct: draft.password_correct,
            file_type_served: draft.served,
            ip_address: client_ip.to_string(),
            verification_code: draft.verification_code,
            otp_verified: draft.otp_verified,
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner-mediated one-time codes.
//!
//! A code is bound to one link, lives for ten minutes, and is consumed by
//! the first verification attempt whatever its outcome. Issuing a new code
//! replaces the previous one.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::Clock;
use crate::crypto::codes::otp_code;
use crate::models::OtpChallenge;
use crate::storage::ShareDatabase;

use super::error::EngineResult;

/// Lifetime of an OTP challenge in seconds.
pub const OTP_TTL_SECS: i64 = 600;

/// Freshly issued challenge. The code must only be handed to the notifier.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OtpAuthority {
    db: Arc<ShareDatabase>,
    clock: Arc<dyn Clock>,
}

impl OtpAuthority {
    pub fn new(db: Arc<ShareDatabase>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Issue a new code for `link_token`, invalidating any live one.
    pub fn issue(&self, link_token: &str) -> EngineResult<IssuedOtp> {
        let issued_at = self.clock.now();
        let expires_at = issued_at + TimeDelta::seconds(OTP_TTL_SECS);
        let code = otp_code();

        self.db.replace_otp(&OtpChallenge {
            link_token: link_token.to_string(),
            code: code.clone(),
            issued_at,
            expires_at,
            consumed: false,
        })?;

        Ok(IssuedOtp { code, expires_at })
    }

    /// True at most once per issued code. Any call consumes the live
    /// challenge; unknown links and storage errors never verify.
    pub fn verify(&self, link_token: &str, submitted: &str) -> EngineResult<bool> {
        Ok(self.db.consume_otp(link_token, submitted.trim(), self.clock.now())?)
    }

    /// Drop challenges that can no longer verify.
    pub fn purge_expired(&self) -> EngineResult<usize> {
        Ok(self.db.purge_expired_otps(self.clock.now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    fn authority() -> (TempDir, OtpAuthority, Arc<ManualClock>) {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(ShareDatabase::open(&temp.path().join("share.redb")).unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (temp, OtpAuthority::new(db, clock.clone()), clock)
    }

    #[test]
    fn code_verifies_once() {
        let (_temp, otp, _clock) = authority();
        let issued = otp.issue("tok").unwrap();
        assert_eq!(issued.code.len(), 6);

        assert!(otp.verify("tok", &issued.code).unwrap());
        assert!(!otp.verify("tok", &issued.code).unwrap());
    }

    #[test]
    fn new_code_invalidates_prior() {
        let (_temp, otp, _clock) = authority();
        let first = otp.issue("tok").unwrap();
        let second = otp.issue("tok").unwrap();

        if first.code != second.code {
            assert!(!otp.verify("tok", &first.code).unwrap());
            let third = otp.issue("tok").unwrap();
            assert!(otp.verify("tok", &third.code).unwrap());
        } else {
            assert!(otp.verify("tok", &second.code).unwrap());
        }
    }

    #[test]
    fn wrong_code_burns_challenge() {
        let (_temp, otp, _clock) = authority();
        let issued = otp.issue("tok").unwrap();
        let wrong = if issued.code == "000000" { "000001" } else { "000000" };

        assert!(!otp.verify("tok", wrong).unwrap());
        assert!(!otp.verify("tok", &issued.code).unwrap());
    }

    #[test]
    fn expires_after_ten_minutes() {
        let (_temp, otp, clock) = authority();
        let issued = otp.issue("tok").unwrap();
        assert_eq!(issued.expires_at, clock.now() + TimeDelta::minutes(10));

        clock.advance(TimeDelta::minutes(10) + TimeDelta::seconds(1));
        assert!(!otp.verify("tok", &issued.code).unwrap());
    }

    #[test]
    fn codes_are_scoped_to_their_link() {
        let (_temp, otp, _clock) = authority();
        let issued = otp.issue("tok-a").unwrap();
        assert!(!otp.verify("tok-b", &issued.code).unwrap());
        assert!(otp.verify("tok-a", &issued.code).unwrap());
    }

    #[test]
    fn purge_removes_stale_challenges() {
        let (_temp, otp, clock) = authority();
        otp.issue("tok").unwrap();
        assert_eq!(otp.purge_expired().unwrap(), 0);
        clock.advance(TimeDelta::minutes(11));
        assert_eq!(otp.purge_expired().unwrap(), 1);
    }
}

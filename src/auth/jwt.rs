use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Both token classes are signed with the same secret but carry distinct
/// audiences, so a refresh token can never pass validation on a protected
/// route and an access token can never drive the refresh endpoint.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_audience: String,
    refresh_audience: String,
    access_expiry: Duration,
    refresh_expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            access_audience: format!("{}-access", config.jwt_issuer),
            refresh_audience: format!("{}-refresh", config.jwt_issuer),
            access_expiry: Duration::minutes(config.jwt_access_expiry_minutes),
            refresh_expiry: Duration::days(config.jwt_refresh_expiry_days),
        })
    }

    pub fn access_expiry_seconds(&self) -> i64 {
        self.access_expiry.num_seconds()
    }

    pub fn generate_access_token(&self, user_id: i32) -> Result<String> {
        self.generate(user_id, &self.access_audience, self.access_expiry)
    }

    pub fn generate_refresh_token(&self, user_id: i32) -> Result<String> {
        self.generate(user_id, &self.refresh_audience, self.refresh_expiry)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.access_audience)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims> {
        self.verify(token, &self.refresh_audience)
    }

    fn generate(&self, user_id: i32, audience: &str, expiry: Duration) -> Result<String> {
        let now = Utc::now();
        let exp = now + expiry;
        let claims = Claims {
            sub: user_id,
            iss: self.issuer.clone(),
            aud: audience.to_owned(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    fn verify(&self, token: &str, audience: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[audience.to_owned()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

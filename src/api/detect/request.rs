// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection request parsing
//!
//! The request is a multipart form with an `image` file and optional
//! `name`, `age` and `gender` text fields.

use axum_extra::extract::Multipart;
use bytes::Bytes;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::UserDetails;

/// A parsed detection upload
#[derive(Debug, Clone)]
pub struct DetectRequest {
    /// Raw image bytes as uploaded
    pub image: Bytes,
    pub user: UserDetails,
}

impl DetectRequest {
    /// Read all form fields
    ///
    /// Unknown fields are ignored. A missing or empty `image` is
    /// `ApiError::MissingImage`; a malformed body is `ApiError::InvalidRequest`.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut image: Option<Bytes> = None;
        let mut name = None;
        let mut age = None;
        let mut gender = None;

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(field_name) = field.name().map(str::to_string) else {
                continue;
            };

            match field_name.as_str() {
                "image" => image = Some(field.bytes().await.map_err(malformed)?),
                "name" => name = Some(field.text().await.map_err(malformed)?),
                "age" => age = Some(field.text().await.map_err(malformed)?),
                "gender" => gender = Some(field.text().await.map_err(malformed)?),
                other => debug!("Ignoring form field '{}'", other),
            }
        }

        let image = image
            .filter(|bytes| !bytes.is_empty())
            .ok_or(ApiError::MissingImage)?;

        Ok(Self {
            image,
            user: UserDetails::from_fields(name, age, gender),
        })
    }
}

fn malformed(e: impl std::fmt::Display) -> ApiError {
    ApiError::InvalidRequest(format!("Malformed multipart body: {}", e))
}

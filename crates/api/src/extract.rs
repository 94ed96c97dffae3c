//! Request extractors whose rejections render as [`AppError`] JSON.

use axum::extract::FromRequest;

use crate::error::AppError;

/// [`axum::Json`] whose rejection (bad syntax, wrong field types, missing
/// content type) becomes a `400 BAD_REQUEST` in the usual `{error, code}` shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

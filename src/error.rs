use std::fmt::{Display, Formatter};

use worker::{Response, Result};

use crate::models::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Parse(String),
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Parse(_) => "parse_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message) | Self::Parse(message) | Self::Internal(message) => message,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Parse(_) => 422,
            Self::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Result<Response> {
        let mut response = Response::from_json(&ErrorResponse {
            code: self.code().to_string(),
            message: self.message().to_string(),
        })?;
        response.headers_mut().set("Cache-Control", "no-store")?;
        Ok(response.with_status(self.status_code()))
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl From<worker::Error> for ApiError {
    fn from(error: worker::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<std::num::ParseIntError> for ApiError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<pdf_reading_order::ParseError> for ApiError {
    fn from(error: pdf_reading_order::ParseError) -> Self {
        match error {
            pdf_reading_order::ParseError::InvalidOption(message) => Self::BadRequest(message),
            other => Self::Parse(other.to_string()),
        }
    }
}

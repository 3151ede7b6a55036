// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in confirmation codes.

use crate::error::AppError;
use ring::rand::{SecureRandom, SystemRandom};

/// Length of a confirmation code.
pub const CODE_LENGTH: usize = 5;

/// Characters a code is drawn from (70 symbols).
pub const CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%&*?";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are discarded so every symbol is equally likely.
const ACCEPT_BELOW: u8 = (256 / CODE_ALPHABET.len() * CODE_ALPHABET.len()) as u8;

/// Generates confirmation codes from the system CSPRNG.
#[derive(Clone)]
pub struct CodeGenerator {
    rng: std::sync::Arc<dyn SecureRandom + Send + Sync>,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self {
            rng: std::sync::Arc::new(SystemRandom::new()),
        }
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a new code uniformly from [`CODE_ALPHABET`].
    pub fn generate(&self) -> Result<String, AppError> {
        let mut code = String::with_capacity(CODE_LENGTH);
        let mut buf = [0u8; 16];

        while code.len() < CODE_LENGTH {
            self.rng.fill(&mut buf).map_err(|_| {
                AppError::Internal(anyhow::anyhow!("System random generator failed"))
            })?;
            for &byte in buf.iter().filter(|&&b| b < ACCEPT_BELOW) {
                if code.len() == CODE_LENGTH {
                    break;
                }
                code.push(CODE_ALPHABET[byte as usize % CODE_ALPHABET.len()] as char);
            }
        }

        Ok(code)
    }
}

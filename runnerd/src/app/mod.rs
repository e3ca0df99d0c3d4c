// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod dispatcher;
pub mod errors;
pub mod pool;
pub mod ports;
pub mod services;
pub mod submit;
pub mod types;

#[cfg(test)]
pub mod testing;

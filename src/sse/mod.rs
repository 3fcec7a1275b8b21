// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Server-sent event decoding

pub mod decoder;

pub use decoder::{decode_stream, SseDecoder, SseEvent, SsePayload};

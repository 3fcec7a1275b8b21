// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::{Map, Value};

/// Flat upper-case keys of the old config file and where they live now.
const LEGACY_KEYS: &[(&str, &str, &str)] = &[
    ("OCTOPUS_API_URL", "api", "base_url"),
    ("AUTH_ENABLED", "api", "auth_enabled"),
    ("NETWORK_RETRY_MAX_ATTEMPTS", "network", "retry_max_attempts"),
    ("NETWORK_RETRY_BASE_DELAY", "network", "retry_base_delay_ms"),
    ("NETWORK_RETRY_MAX_DELAY", "network", "retry_max_delay_ms"),
    ("NETWORK_RETRY_JITTER_PERCENT", "network", "retry_jitter_percent"),
    ("NETWORK_CONNECTION_TIMEOUT", "network", "connection_timeout_ms"),
    ("NETWORK_REQUEST_TIMEOUT", "network", "request_timeout_ms"),
    ("DEFAULT_PROVIDER", "defaults", "provider"),
    ("DEFAULT_MODEL", "defaults", "model"),
];

/// Move legacy flat keys into their sections. Values stored as strings are
/// coerced to the JSON type the section expects; empty strings are dropped.
pub(super) fn migrate_on_load(value: Value) -> Value {
    let Value::Object(mut root) = value else {
        return value;
    };

    for (legacy, section, field) in LEGACY_KEYS {
        let Some(raw) = root.remove(*legacy) else {
            continue;
        };
        let Some(converted) = coerce_legacy(field, raw) else {
            continue;
        };

        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(section_map) = entry {
            section_map.entry(field.to_string()).or_insert(converted);
        }
    }

    Value::Object(root)
}

fn coerce_legacy(field: &str, raw: Value) -> Option<Value> {
    let Value::String(text) = raw else {
        return Some(raw);
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match field {
        "base_url" | "provider" | "model" => Some(Value::String(text.to_string())),
        "auth_enabled" => Some(Value::Bool(text != "false")),
        _ => text.parse::<u64>().ok().map(Value::from),
    }
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is serialized current struct.
/// Overlay values take priority.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}

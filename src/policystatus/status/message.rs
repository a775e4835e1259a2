/*
 * Copyright (C) 2024 The Nanocloud Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::borrow::Cow;

/// Upper bound for condition messages accepted by the status subresource.
pub const MAX_CONDITION_MESSAGE_LENGTH: usize = 32768;

/// Marker appended to messages cut at the length bound.
pub const TRUNCATED_SUFFIX: &str = " [truncated]";

/// Bounds `message` to `max_len` bytes, appending [`TRUNCATED_SUFFIX`] when
/// anything was cut.
///
/// The limit counts UTF-8 bytes. If byte `max_len` falls inside a multi-byte
/// character the cut moves back to the preceding character boundary, so the
/// kept prefix may be shorter than `max_len` for non-ASCII text.
pub fn sanitize_message(message: &str, max_len: usize) -> Cow<'_, str> {
    if message.len() <= max_len {
        return Cow::Borrowed(message);
    }

    let mut cut = max_len;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut truncated = String::with_capacity(cut + TRUNCATED_SUFFIX.len());
    truncated.push_str(&message[..cut]);
    truncated.push_str(TRUNCATED_SUFFIX);
    Cow::Owned(truncated)
}

pub fn truncate_condition_message(message: &str) -> Cow<'_, str> {
    sanitize_message(message, MAX_CONDITION_MESSAGE_LENGTH)
}

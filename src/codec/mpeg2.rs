// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MPEG-2 video (ISO/IEC 13818-2) elementary stream support.

pub mod graph;
pub mod parser;
pub mod picture;
pub mod stream;
pub mod synthesizer;
pub mod tables;

// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Common types shared by the UpTend client crates.

pub mod identifiers;
pub mod messages;
pub mod time;

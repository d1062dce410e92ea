// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Library root.
//!
//! # Crate Architecture
//!
//! ```text
//!                        main.rs
//!                           |
//!                +----------+----------+
//!                v                     v
//!             cli (clap)          cmd (handlers)
//!                |        list / tree / view / download
//!                +----------+----------+
//!                           v
//!              ,---------------------------,
//!              |          config           |
//!              |   TOML, layered settings  |
//!              '-------------+-------------'
//!                            v
//!                       browser  ------------------> git
//!              read-through, offline fallback     clone/pull
//!                |        |         |       |
//!                v        v         v       v
//!          connectivity remote    cache   download
//!           TCP probe  API/HTML   files   worker pool
//!                         |                 |
//!                         +----> tree <-----+
//!
//!   +-----------------------------------------+
//!   |  foundation   error, logging            |
//!   +-----------------------------------------+
//! ```

pub mod browser;
pub mod cache;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod connectivity;
pub mod download;
pub mod error;
pub mod git;
pub mod logging;
pub mod remote;
pub mod tree;

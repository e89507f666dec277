// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod booking;
pub mod mailer;
pub mod sync;

pub use booking::BookingService;
pub use mailer::ConfirmationMailer;
pub use sync::ScheduleSynchronizer;

//! Best-effort side effect helpers.
//!
//! Voucher rendering and notification dispatch run after an operation has
//! committed. Their failures are logged at `warn` and never propagated, so
//! a flaky renderer or transport can degrade delivery but never roll back
//! state.

use brokerage_core::environment::VoucherRenderer;
use brokerage_core::events::{Notification, NotificationFanout};
use brokerage_core::types::ReservationSnapshot;
use std::sync::Arc;

/// Renders a voucher from a committed snapshot, logging the outcome
pub(crate) async fn render_voucher(
    voucher: &Arc<dyn VoucherRenderer>,
    snapshot: &ReservationSnapshot,
) {
    match voucher.render(snapshot).await {
        Ok(path) => tracing::info!(
            unit_number = %snapshot.unit_number,
            path = %path.display(),
            "Voucher rendered"
        ),
        Err(error) => tracing::warn!(
            unit_number = %snapshot.unit_number,
            error = %error,
            "Voucher rendering failed"
        ),
    }
}

/// Dispatches one notification, logging a failed delivery
pub(crate) async fn dispatch(fanout: &Arc<dyn NotificationFanout>, notification: Notification) {
    let event_type = notification.context.event_type();
    if let Err(error) = fanout.notify(notification).await {
        tracing::warn!(
            event = event_type,
            error = %error,
            "Notification dispatch failed"
        );
    }
}

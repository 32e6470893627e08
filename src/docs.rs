use crate::api::attendance::{CheckInPayload, CheckOutPayload, UnfinishedResponse};
use crate::attendance::lateness::LatenessStatus;
use crate::attendance::lifecycle::{CheckInOutcome, SweepFailure, SweepReport};
use crate::model::session::{
    CheckoutRemark, ClosedSession, OpenSession, OpenSessionView, RecapFilter, RecapPage,
};
use crate::model::shift::ShiftDefinition;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Presensi API",
        version = "1.0.0",
        description = r#"
## Hospital Attendance (Presensi) Service

Tracks each employee's attendance session from check-in to check-out.

### Session lifecycle
- **Check-in** opens a session against the employee's scheduled shift and records lateness
  (`On Time`, `Late (Grace)`, `Late I`, `Late II`).
- **Check-out** moves the open session into the recap in a single transaction.
- **Auto-checkout** closes a session left open past its scheduled end plus a grace period,
  using the *scheduled* end as the departure time.
- Night shifts whose end time is earlier than their start time end on the next calendar day.

### Security
Every endpoint requires a **JWT Bearer** access token issued by the portal's auth service.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::auto_checkout,
        crate::api::attendance::unfinished,
        crate::api::attendance::recap,
        crate::api::attendance::sweep
    ),
    components(
        schemas(
            CheckInPayload,
            CheckOutPayload,
            CheckInOutcome,
            UnfinishedResponse,
            OpenSession,
            OpenSessionView,
            ClosedSession,
            CheckoutRemark,
            LatenessStatus,
            RecapFilter,
            RecapPage,
            SweepReport,
            SweepFailure,
            ShiftDefinition
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance session lifecycle APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

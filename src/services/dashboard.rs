//! Dashboard services - Riepiloghi in sola lettura per ruolo

use crate::core::{AppError, AppState, ClinicContext, Json, Query, require_role};
use crate::dtos::{ApiResponse, DashboardDTO, RevenuePointDTO, RevenueQuery};
use crate::entities::Role;
use axum::{
    Extension,
    extract::State,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Admin,
    Doctor,
    Reception,
}

fn view_for(role: Role) -> View {
    match role.in_clinic() {
        Role::SuperAdmin | Role::Admin | Role::Accountant => View::Admin,
        Role::Doctor => View::Doctor,
        Role::Nurse | Role::Receptionist | Role::Staff => View::Reception,
    }
}

#[instrument(skip(state, ctx), fields(clinic_id = %ctx.clinic_id(), user_id = %ctx.user_id))]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
) -> Result<Json<ApiResponse<DashboardDTO>>, AppError> {
    let now = Utc::now();
    let view = view_for(ctx.role());
    debug!("Computing {:?} dashboard", view);

    let dashboard = match view {
        View::Admin => DashboardDTO::Admin(state.dashboard.admin_view(ctx.clinic_id(), now).await?),
        View::Doctor => DashboardDTO::Doctor(
            state
                .dashboard
                .doctor_view(ctx.clinic_id(), ctx.user_id, now)
                .await?,
        ),
        View::Reception => {
            DashboardDTO::Reception(state.dashboard.reception_view(ctx.clinic_id(), now).await?)
        }
    };

    Ok(Json(ApiResponse::new(dashboard)))
}

#[instrument(skip(state, ctx, query), fields(clinic_id = %ctx.clinic_id()))]
pub async fn get_revenue(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ClinicContext>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<ApiResponse<Vec<RevenuePointDTO>>>, AppError> {
    require_role(&ctx, &[Role::Accountant])?;
    let months = query.months();
    debug!("Computing revenue series for {} months", months);

    let series = state
        .dashboard
        .revenue_series(ctx.clinic_id(), Utc::now().date_naive(), months)
        .await?;

    Ok(Json(ApiResponse::new(series)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accountants_get_the_admin_view() {
        assert_eq!(view_for(Role::Admin), View::Admin);
        assert_eq!(view_for(Role::SuperAdmin), View::Admin);
        assert_eq!(view_for(Role::Accountant), View::Admin);
    }

    #[test]
    fn front_desk_roles_get_the_reception_view() {
        assert_eq!(view_for(Role::Doctor), View::Doctor);
        assert_eq!(view_for(Role::Nurse), View::Reception);
        assert_eq!(view_for(Role::Receptionist), View::Reception);
        assert_eq!(view_for(Role::Staff), View::Reception);
    }
}

//! Access policy: which colleges and departments a requester may read.
//!
//! Access is all-or-nothing per request. A request either resolves to a
//! scope the requester fully owns or it is rejected with `Forbidden`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::context::RequestContext,
    error::{AppError, AppResult},
    model::role::{Reach, Role},
};

/// Row filter applied to every scoped read. `None` means unrestricted.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct Scope {
    #[param(example = 1)]
    #[serde(alias = "college_id")]
    pub college_id: Option<u64>,
    #[param(example = 4)]
    #[serde(alias = "department_id")]
    pub department_id: Option<u64>,
}

impl Scope {
    pub const ALL: Scope = Scope {
        college_id: None,
        department_id: None,
    };

    pub fn college(college_id: u64) -> Self {
        Scope {
            college_id: Some(college_id),
            department_id: None,
        }
    }

    pub fn department(college_id: Option<u64>, department_id: u64) -> Self {
        Scope {
            college_id,
            department_id: Some(department_id),
        }
    }

    /// True when a record owned by `(college_id, department_id)` falls inside.
    pub fn contains(&self, college_id: u64, department_id: u64) -> bool {
        self.college_id.is_none_or(|c| c == college_id)
            && self.department_id.is_none_or(|d| d == department_id)
    }
}

/// The owner of a concrete record.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Target {
    pub college_id: u64,
    pub department_id: u64,
}

/// The widest scope the requester may read.
pub fn reach_scope(ctx: &RequestContext) -> AppResult<Scope> {
    match ctx.role.reach() {
        Reach::Global => Ok(Scope::ALL),
        Reach::College => ctx
            .college_id
            .map(Scope::college)
            .ok_or_else(|| AppError::forbidden("Staff account has no college assigned")),
        Reach::Department => ctx
            .department_id
            .map(|d| Scope::department(ctx.college_id, d))
            .ok_or_else(|| AppError::forbidden("HOD account has no department assigned")),
    }
}

/// Checks a single record against the requester's reach.
pub fn authorize(ctx: &RequestContext, target: Target) -> AppResult<()> {
    let scope = reach_scope(ctx)?;
    if scope.contains(target.college_id, target.department_id) {
        Ok(())
    } else {
        tracing::info!(
            actor_id = ctx.actor_id,
            role = %ctx.role,
            college_id = target.college_id,
            department_id = target.department_id,
            "Access denied by scope"
        );
        Err(AppError::forbidden("Access denied to this record"))
    }
}

/// Narrows a requested filter to the effective scope. Components the caller
/// leaves out are filled from the requester's reach; components that point
/// outside it are rejected.
pub fn resolve_scope(ctx: &RequestContext, requested: Scope) -> AppResult<Scope> {
    let reach = reach_scope(ctx)?;

    let college_id = match (reach.college_id, requested.college_id) {
        (Some(own), Some(asked)) if own != asked => {
            return Err(AppError::forbidden("Access denied to this college"));
        }
        (own, asked) => asked.or(own),
    };

    let department_id = match (reach.department_id, requested.department_id) {
        (Some(own), Some(asked)) if own != asked => {
            return Err(AppError::forbidden("Access denied to this department"));
        }
        (own, asked) => asked.or(own),
    };

    Ok(Scope {
        college_id,
        department_id,
    })
}

pub fn require_role(ctx: &RequestContext, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&ctx.role) {
        Ok(())
    } else {
        Err(AppError::forbidden("Insufficient permissions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::fixtures::{chairman, context, hod, staff};

    const CSE: Target = Target {
        college_id: 1,
        department_id: 4,
    };
    const ECE: Target = Target {
        college_id: 1,
        department_id: 5,
    };
    const OTHER_COLLEGE: Target = Target {
        college_id: 2,
        department_id: 9,
    };

    #[test]
    fn chairman_reaches_everything() {
        let ctx = chairman();
        for target in [CSE, ECE, OTHER_COLLEGE] {
            assert!(authorize(&ctx, target).is_ok());
        }
        assert_eq!(resolve_scope(&ctx, Scope::college(2)).unwrap(), Scope::college(2));
        assert_eq!(resolve_scope(&ctx, Scope::ALL).unwrap(), Scope::ALL);
    }

    #[test]
    fn hod_is_confined_to_their_department() {
        let ctx = hod(1, 4);
        assert!(authorize(&ctx, CSE).is_ok());
        assert!(matches!(authorize(&ctx, ECE), Err(AppError::Forbidden(_))));
        assert!(matches!(authorize(&ctx, OTHER_COLLEGE), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn staff_sees_every_department_of_their_college() {
        let ctx = staff(1);
        assert!(authorize(&ctx, CSE).is_ok());
        assert!(authorize(&ctx, ECE).is_ok());
        assert!(authorize(&ctx, OTHER_COLLEGE).is_err());
    }

    #[test]
    fn omitted_filters_default_to_own_affiliation() {
        assert_eq!(resolve_scope(&staff(1), Scope::ALL).unwrap(), Scope::college(1));
        assert_eq!(
            resolve_scope(&hod(1, 4), Scope::college(1)).unwrap(),
            Scope::department(Some(1), 4)
        );
        assert_eq!(
            resolve_scope(&staff(1), Scope::department(None, 5)).unwrap(),
            Scope::department(Some(1), 5)
        );
    }

    #[test]
    fn filters_outside_reach_are_rejected_not_trimmed() {
        assert!(resolve_scope(&staff(1), Scope::college(2)).is_err());
        assert!(resolve_scope(&hod(1, 4), Scope::department(None, 5)).is_err());
    }

    #[test]
    fn missing_affiliation_is_forbidden() {
        let orphan_staff = context(Role::Staff, None, Some(4));
        let orphan_hod = context(Role::Hod, Some(1), None);
        assert!(matches!(reach_scope(&orphan_staff), Err(AppError::Forbidden(_))));
        assert!(matches!(reach_scope(&orphan_hod), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn role_gate() {
        assert!(require_role(&chairman(), &[Role::Chairman]).is_ok());
        assert!(require_role(&staff(1), &[Role::Chairman]).is_err());
    }
}

//! Role permission statements
//!
//! Each role is granted a fixed set of actions per resource. Admins are
//! granted everything; plain users get nothing on the dashboard.

use crate::models::UserRole;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Post,
    Category,
    BreakingNews,
    Message,
    Upload,
    Dashboard,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Publish,
    Ban,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Post,
        Resource::Category,
        Resource::BreakingNews,
        Resource::Message,
        Resource::Upload,
        Resource::Dashboard,
        Resource::User,
    ];
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Publish,
        Action::Ban,
    ];
}

/// Editor grants, per resource
fn editor_actions(resource: Resource) -> &'static [Action] {
    use Action::*;
    match resource {
        Resource::Post => &[Create, Read, Update, Delete, Publish],
        Resource::Category => &[Create, Update, Delete],
        Resource::BreakingNews => &[Create, Read, Update, Delete],
        Resource::Message => &[Read, Update],
        Resource::Upload => &[Create],
        Resource::Dashboard => &[Read],
        Resource::User => &[],
    }
}

/// Whether `role` may perform `action` on `resource`
pub fn role_allows(role: UserRole, resource: Resource, action: Action) -> bool {
    match role {
        UserRole::Admin => true,
        UserRole::Editor => editor_actions(resource).contains(&action),
        UserRole::User => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_editor_statements() {
        let editor = UserRole::Editor;
        assert!(role_allows(editor, Resource::Post, Action::Publish));
        assert!(role_allows(editor, Resource::Category, Action::Delete));
        assert!(role_allows(editor, Resource::Message, Action::Update));
        assert!(role_allows(editor, Resource::Upload, Action::Create));

        assert!(!role_allows(editor, Resource::Message, Action::Delete));
        assert!(!role_allows(editor, Resource::User, Action::Read));
        assert!(!role_allows(editor, Resource::User, Action::Ban));
    }

    fn resource() -> impl Strategy<Value = Resource> {
        prop::sample::select(Resource::ALL.to_vec())
    }

    fn action() -> impl Strategy<Value = Action> {
        prop::sample::select(Action::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_admin_allowed_everything(r in resource(), a in action()) {
            prop_assert!(role_allows(UserRole::Admin, r, a));
        }

        #[test]
        fn prop_user_allowed_nothing(r in resource(), a in action()) {
            prop_assert!(!role_allows(UserRole::User, r, a));
        }

        #[test]
        fn prop_editor_is_subset_of_admin(r in resource(), a in action()) {
            if role_allows(UserRole::Editor, r, a) {
                prop_assert!(role_allows(UserRole::Admin, r, a));
            }
        }
    }
}

//! Stored document layout
//!
//! Collection names, field names and the conversions between domain types
//! and store documents. Decoding happens here so stored instants become
//! `chrono` values before anything else sees them.

use chrono::{DateTime, Utc};
use famtask_model::{
    Family, FamilyId, InviteCode, NewTask, Role, Task, TaskId, TaskPriority, TaskStatus,
    UserId, UserProfile,
};
use famtask_store::{Document, Patch, StoreError, Timestamp};
use serde_json::Value;
use std::str::FromStr;

/// Collection names
pub mod collections {
    /// User profiles, keyed by uid
    pub const USERS: &str = "users";
    /// Families
    pub const FAMILIES: &str = "families";
    /// Tasks
    pub const TASKS: &str = "tasks";
    /// Push registration tokens, keyed by token
    pub const FCM_TOKENS: &str = "fcmTokens";
}

/// Field names
pub mod fields {
    #![allow(missing_docs)]
    pub const UID: &str = "uid";
    pub const EMAIL: &str = "email";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const ROLE: &str = "role";
    pub const FAMILY_ID: &str = "familyId";

    pub const PARENT_IDS: &str = "parentIds";
    pub const CHILD_IDS: &str = "childIds";
    pub const INVITE_CODE: &str = "inviteCode";
    pub const CREATED_AT: &str = "createdAt";

    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const PRIORITY: &str = "priority";
    pub const CREATED_BY: &str = "createdBy";
    pub const ASSIGNED_TO: &str = "assignedTo";
    pub const STATUS: &str = "status";
    pub const LAST_MODIFIED: &str = "lastModified";
    pub const SEEN_AT: &str = "seenAt";
    pub const PLANNED_COMPLETION_TIME: &str = "plannedCompletionTime";
    pub const COMPLETED_AT: &str = "completedAt";
    pub const DUE_DATE: &str = "dueDate";

    pub const USER_ID: &str = "userId";
    pub const TOKEN: &str = "token";
    pub const LAST_USED: &str = "lastUsed";
}

use fields as f;

/// Encode an instant as a stored field value
#[must_use]
pub fn instant(at: DateTime<Utc>) -> Value {
    Timestamp::from(at).to_value()
}

fn user_ids(ids: &[UserId]) -> Value {
    Value::Array(ids.iter().map(|id| Value::from(id.as_str())).collect())
}

/// Field reader that reports shape errors against its document
struct Reader<'a> {
    collection: &'static str,
    doc: &'a Document,
}

impl<'a> Reader<'a> {
    fn new(collection: &'static str, doc: &'a Document) -> Self {
        Self { collection, doc }
    }

    fn invalid(&self, reason: impl Into<String>) -> StoreError {
        StoreError::InvalidDocument {
            collection: self.collection.to_string(),
            id: self.doc.id.to_string(),
            reason: reason.into(),
        }
    }

    fn opt_str(&self, field: &str) -> Result<Option<&'a str>, StoreError> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(format!("{field}: expected string, got {other}"))),
        }
    }

    fn str(&self, field: &str) -> Result<&'a str, StoreError> {
        self.opt_str(field)?
            .ok_or_else(|| self.invalid(format!("{field}: missing")))
    }

    fn parse<T>(&self, field: &str) -> Result<T, StoreError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.str(field)?
            .parse()
            .map_err(|e: T::Err| self.invalid(format!("{field}: {e}")))
    }

    fn opt_instant(&self, field: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Timestamp::from_value(v)
                .and_then(Timestamp::to_datetime)
                .map(Some)
                .ok_or_else(|| self.invalid(format!("{field}: not a timestamp"))),
        }
    }

    fn instant(&self, field: &str) -> Result<DateTime<Utc>, StoreError> {
        self.opt_instant(field)?
            .ok_or_else(|| self.invalid(format!("{field}: missing")))
    }

    fn ids(&self, field: &str) -> Result<Vec<UserId>, StoreError> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(UserId::new)
                        .ok_or_else(|| self.invalid(format!("{field}: non-string member")))
                })
                .collect(),
            Some(other) => Err(self.invalid(format!("{field}: expected array, got {other}"))),
        }
    }
}

/// Decode a task document
///
/// # Errors
/// - `StoreError::InvalidDocument` naming the first malformed field
pub fn decode_task(doc: &Document) -> Result<Task, StoreError> {
    let r = Reader::new(collections::TASKS, doc);
    let created_at = r.instant(f::CREATED_AT)?;
    Ok(Task {
        id: TaskId::new(doc.id.as_str()),
        family_id: FamilyId::new(r.str(f::FAMILY_ID)?),
        title: r.str(f::TITLE)?.to_string(),
        description: r.opt_str(f::DESCRIPTION)?.map(str::to_string),
        priority: r.parse::<TaskPriority>(f::PRIORITY)?,
        created_by: UserId::new(r.str(f::CREATED_BY)?),
        assigned_to: UserId::new(r.str(f::ASSIGNED_TO)?),
        status: r.parse::<TaskStatus>(f::STATUS)?,
        created_at,
        last_modified: r.opt_instant(f::LAST_MODIFIED)?.unwrap_or(created_at),
        seen_at: r.opt_instant(f::SEEN_AT)?,
        planned_completion_time: r.opt_instant(f::PLANNED_COMPLETION_TIME)?,
        completed_at: r.opt_instant(f::COMPLETED_AT)?,
        due_date: r.opt_instant(f::DUE_DATE)?,
    })
}

/// Decode a family document
///
/// # Errors
/// - `StoreError::InvalidDocument` naming the first malformed field
pub fn decode_family(doc: &Document) -> Result<Family, StoreError> {
    let r = Reader::new(collections::FAMILIES, doc);
    let code = r.str(f::INVITE_CODE)?;
    Ok(Family {
        id: FamilyId::new(doc.id.as_str()),
        parent_ids: r.ids(f::PARENT_IDS)?,
        child_ids: r.ids(f::CHILD_IDS)?,
        invite_code: InviteCode::parse(code).map_err(|e| r.invalid(e.to_string()))?,
        created_at: r.opt_instant(f::CREATED_AT)?,
    })
}

/// Decode a profile document
///
/// # Errors
/// - `StoreError::InvalidDocument` naming the first malformed field
pub fn decode_profile(doc: &Document) -> Result<UserProfile, StoreError> {
    let r = Reader::new(collections::USERS, doc);
    let role = r
        .opt_str(f::ROLE)?
        .map(|s| s.parse::<Role>().map_err(|e| r.invalid(e.to_string())))
        .transpose()?;
    Ok(UserProfile {
        uid: UserId::new(r.opt_str(f::UID)?.unwrap_or(doc.id.as_str())),
        email: r.opt_str(f::EMAIL)?.map(str::to_string),
        display_name: r.opt_str(f::DISPLAY_NAME)?.map(str::to_string),
        role,
        family_id: r.opt_str(f::FAMILY_ID)?.map(FamilyId::new),
    })
}

/// Fields of a freshly created task
#[must_use]
pub fn new_task_patch(
    draft: &NewTask,
    family_id: &FamilyId,
    created_by: &UserId,
    assigned_to: &UserId,
) -> Patch {
    let patch = Patch::new()
        .set(f::FAMILY_ID, family_id.as_str())
        .set(f::TITLE, draft.title.as_str())
        .set(f::PRIORITY, draft.priority.as_str())
        .set(f::CREATED_BY, created_by.as_str())
        .set(f::ASSIGNED_TO, assigned_to.as_str())
        .set(f::STATUS, TaskStatus::Created.as_str())
        .server_timestamp(f::CREATED_AT)
        .server_timestamp(f::LAST_MODIFIED)
        .null(f::SEEN_AT)
        .null(f::PLANNED_COMPLETION_TIME)
        .null(f::COMPLETED_AT);

    let patch = match &draft.description {
        Some(text) => patch.set(f::DESCRIPTION, text.as_str()),
        None => patch.null(f::DESCRIPTION),
    };
    match draft.due_date {
        Some(due) => patch.set(f::DUE_DATE, instant(due)),
        None => patch.null(f::DUE_DATE),
    }
}

/// Fields of a freshly created family
#[must_use]
pub fn new_family_patch(parent: &UserId, code: &InviteCode) -> Patch {
    Patch::new()
        .set(f::PARENT_IDS, user_ids(std::slice::from_ref(parent)))
        .set(f::CHILD_IDS, user_ids(&[]))
        .set(f::INVITE_CODE, code.as_str())
        .server_timestamp(f::CREATED_AT)
}

/// Replace one member list of a family
#[must_use]
pub fn members_patch(role: Role, members: &[UserId]) -> Patch {
    let field = match role {
        Role::Parent => f::PARENT_IDS,
        Role::Child => f::CHILD_IDS,
    };
    Patch::new().set(field, user_ids(members))
}

/// Fields of a freshly created profile
#[must_use]
pub fn profile_patch(profile: &UserProfile) -> Patch {
    let opt = |v: Option<&str>| v.map_or(Value::Null, Value::from);
    Patch::new()
        .set(f::UID, profile.uid.as_str())
        .set(f::EMAIL, opt(profile.email.as_deref()))
        .set(f::DISPLAY_NAME, opt(profile.display_name.as_deref()))
        .set(f::ROLE, opt(profile.role.as_ref().map(Role::as_str)))
        .set(f::FAMILY_ID, opt(profile.family_id.as_ref().map(FamilyId::as_str)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use famtask_store::{DocumentId, Fields, Revision};
    use serde_json::json;

    fn doc(id: &str, patch: &Patch) -> Document {
        let mut fields = Fields::new();
        patch.apply(&mut fields, Timestamp::new(1_700_000_000, 0));
        Document {
            id: DocumentId::new(id),
            revision: Revision::INITIAL,
            fields,
        }
    }

    #[test]
    fn new_task_decodes_as_created() {
        let due = Utc.with_ymd_and_hms(2024, 7, 1, 18, 0, 0).unwrap();
        let draft = NewTask::new("Clean room", TaskPriority::Green).with_due_date(due);
        let patch = new_task_patch(&draft, &FamilyId::new("f1"), &UserId::new("mom"), &UserId::new("kid"));

        let task = decode_task(&doc("t1", &patch)).unwrap();
        assert_eq!(task.status, TaskStatus::Created);
        assert_eq!(task.created_at, task.last_modified);
        assert_eq!(task.due_date, Some(due));
        assert!(task.seen_at.is_none());
        assert!(task.planned_completion_time.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.description.is_none());
    }

    #[test]
    fn malformed_task_names_field() {
        let patch = Patch::new()
            .set(f::FAMILY_ID, "f1")
            .set(f::TITLE, "x")
            .set(f::PRIORITY, "purple")
            .set(f::CREATED_BY, "mom")
            .set(f::ASSIGNED_TO, "kid")
            .set(f::STATUS, "created")
            .server_timestamp(f::CREATED_AT);
        let err = decode_task(&doc("t1", &patch)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { ref reason, .. } if reason.starts_with("priority")));
    }

    #[test]
    fn task_with_string_timestamp_is_rejected() {
        let draft = NewTask::new("x", TaskPriority::Red);
        let mut d = doc(
            "t1",
            &new_task_patch(&draft, &FamilyId::new("f"), &UserId::new("p"), &UserId::new("c")),
        );
        d.fields.insert(f::SEEN_AT.into(), json!("yesterday"));
        assert!(decode_task(&d).is_err());
    }

    #[test]
    fn family_round_trip() {
        let code = InviteCode::parse("ABC234").unwrap();
        let patch = new_family_patch(&UserId::new("mom"), &code);
        let family = decode_family(&doc("f1", &patch)).unwrap();
        assert_eq!(family.parent_ids, vec![UserId::new("mom")]);
        assert!(family.child_ids.is_empty());
        assert_eq!(family.invite_code, code);
        assert!(family.created_at.is_some());
    }

    #[test]
    fn profile_without_role_or_family() {
        let profile = UserProfile::for_identity(UserId::new("u1"), Some("sam@example.com".into()), None);
        let decoded = decode_profile(&doc("u1", &profile_patch(&profile))).unwrap();
        assert_eq!(decoded, profile);
        assert_eq!(decoded.display_name.as_deref(), Some("sam"));
    }
}

//! Join record entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{JoinRecord, JoinType};

/// Database row mapping for a join record table.
///
/// `join_type` is stored as text and parsed on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct JoinRecordEntity {
    pub id: Uuid,
    pub guild_id: String,
    pub invitee_id: String,
    pub inviter_id: Option<String>,
    pub invite_code: Option<String>,
    pub join_type: String,
    pub fake: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl TryFrom<JoinRecordEntity> for JoinRecord {
    type Error = String;

    fn try_from(entity: JoinRecordEntity) -> Result<Self, Self::Error> {
        let join_type: JoinType = entity.join_type.parse()?;
        Ok(Self {
            id: entity.id,
            guild_id: entity.guild_id,
            invitee_id: entity.invitee_id,
            inviter_id: entity.inviter_id,
            invite_code: entity.invite_code,
            join_type,
            fake: entity.fake,
            joined_at: entity.joined_at,
            left_at: entity.left_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entity(join_type: &str) -> JoinRecordEntity {
        JoinRecordEntity {
            id: Uuid::new_v4(),
            guild_id: "81384788765712384".to_string(),
            invitee_id: "175928847299117063".to_string(),
            inviter_id: Some("80351110224678912".to_string()),
            invite_code: Some("abc123".to_string()),
            join_type: join_type.to_string(),
            fake: false,
            joined_at: Utc::now(),
            left_at: None,
        }
    }

    #[test]
    fn test_entity_converts_to_record() {
        let entity = create_test_entity("normal");
        let id = entity.id;

        let record = JoinRecord::try_from(entity).unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.join_type, JoinType::Normal);
        assert_eq!(record.invite_code.as_deref(), Some("abc123"));
        assert!(record.is_open());
    }

    #[test]
    fn test_vanity_entity_keeps_empty_inviter() {
        let mut entity = create_test_entity("vanity");
        entity.inviter_id = None;
        entity.left_at = Some(Utc::now());

        let record = JoinRecord::try_from(entity).unwrap();

        assert_eq!(record.join_type, JoinType::Vanity);
        assert!(record.inviter_id.is_none());
        assert!(!record.is_open());
    }

    #[test]
    fn test_unrecognized_join_type_is_rejected() {
        let entity = create_test_entity("invite");
        let err = JoinRecord::try_from(entity).unwrap_err();
        assert!(err.contains("invite"));
    }
}

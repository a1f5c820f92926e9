use anyhow::Result;
use hearth_lib::{
    add_member, create_household, create_profile, default_household_id, delete_household,
    list_members, remove_member, MemberError,
};

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn add_list_remove_member_roundtrip() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;
    let profile = create_profile(&pool, "Ada", "ada@example.com").await?;

    let member = add_member(&pool, &household_id, &profile.id, "owner").await?;
    assert_eq!(member.display_name, "Ada");
    assert_eq!(member.email, "ada@example.com");
    assert_eq!(member.role, "owner");

    let members = list_members(&pool, &household_id).await?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, member.id);

    remove_member(&pool, &household_id, &member.id).await?;
    assert!(list_members(&pool, &household_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn profile_preconditions_fail_without_touching_the_store() -> Result<()> {
    let pool = util::memory_pool().await?;

    let err = create_profile(&pool, "   ", "ada@example.com")
        .await
        .expect_err("blank display name should be rejected");
    assert!(matches!(err, MemberError::InvalidDisplayName));

    let err = create_profile(&pool, "Ada", "not-an-email")
        .await
        .expect_err("bad email should be rejected");
    assert!(matches!(err, MemberError::InvalidEmail));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_live_membership_is_rejected() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;
    let profile = create_profile(&pool, "Grace", "grace@example.com").await?;

    add_member(&pool, &household_id, &profile.id, "member").await?;
    let err = add_member(&pool, &household_id, &profile.id, "member")
        .await
        .expect_err("second live link should be rejected");
    assert!(matches!(err, MemberError::DuplicateMember));
    Ok(())
}

#[tokio::test]
async fn removed_member_may_rejoin() -> Result<()> {
    let pool = util::memory_pool().await?;
    let household_id = default_household_id(&pool).await?;
    let profile = create_profile(&pool, "Lin", "lin@example.com").await?;

    let member = add_member(&pool, &household_id, &profile.id, "member").await?;
    remove_member(&pool, &household_id, &member.id).await?;

    let rejoined = add_member(&pool, &household_id, &profile.id, "member").await?;
    assert_ne!(rejoined.id, member.id);
    assert_eq!(list_members(&pool, &household_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn membership_requires_a_live_household() -> Result<()> {
    let pool = util::memory_pool().await?;
    default_household_id(&pool).await?;
    let doomed = create_household(&pool, "Doomed").await?;
    let profile = create_profile(&pool, "Sam", "sam@example.com").await?;
    delete_household(&pool, &doomed.id).await?;

    let err = add_member(&pool, &doomed.id, &profile.id, "member")
        .await
        .expect_err("deleted household should not accept members");
    assert!(matches!(err, MemberError::HouseholdUnavailable));
    Ok(())
}

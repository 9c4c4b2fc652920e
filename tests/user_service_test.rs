//! User service unit tests.

mod common;

use std::sync::Arc;

use mockall::predicate::eq;
use uuid::Uuid;

use common::{create_test_user, user_with_password, TestUnitOfWork, TEST_PASSWORD};
use treechat::domain::{Password, UserRole};
use treechat::errors::AppError;
use treechat::infra::MockUserRepository;
use treechat::services::{UserManager, UserService};

#[tokio::test]
async fn test_get_user_success() {
    let user_id = Uuid::new_v4();

    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id()
        .with(eq(user_id))
        .returning(|id| Ok(Some(create_test_user(id, UserRole::Client))));

    let service = UserManager::new(Arc::new(TestUnitOfWork::with_users(repo)));
    let result = service.get_user(user_id).await;

    assert_eq!(result.unwrap().id, user_id);
}

#[tokio::test]
async fn test_get_user_not_found() {
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id().returning(|_| Ok(None));

    let service = UserManager::new(Arc::new(TestUnitOfWork::with_users(repo)));
    let result = service.get_user(Uuid::new_v4()).await;

    assert!(matches!(result.unwrap_err(), AppError::NotFound));
}

#[tokio::test]
async fn test_update_profile_normalizes_input() {
    let user_id = Uuid::new_v4();

    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email()
        .withf(|email| email == "ada@example.com")
        .returning(|_| Ok(None));
    repo.expect_update_profile()
        .withf(move |id, name, email| {
            *id == user_id && name == "Ada Lovelace" && email == "ada@example.com"
        })
        .returning(|id, name, email| {
            let mut user = create_test_user(id, UserRole::Client);
            user.name = name;
            user.email = email;
            Ok(user)
        });

    let service = UserManager::new(Arc::new(TestUnitOfWork::with_users(repo)));
    let user = service
        .update_profile(
            user_id,
            "  Ada Lovelace ".to_string(),
            " Ada@Example.com".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(user.email, "ada@example.com");
}

#[tokio::test]
async fn test_update_profile_rejects_taken_email() {
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email()
        .returning(|_| Ok(Some(create_test_user(Uuid::new_v4(), UserRole::Client))));
    repo.expect_update_profile().never();

    let service = UserManager::new(Arc::new(TestUnitOfWork::with_users(repo)));
    let result = service
        .update_profile(
            Uuid::new_v4(),
            "Ada".to_string(),
            "test@example.com".to_string(),
        )
        .await;

    assert!(matches!(result.unwrap_err(), AppError::Conflict(_)));
}

#[tokio::test]
async fn test_update_profile_keeps_own_email() {
    let user_id = Uuid::new_v4();

    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email()
        .returning(move |_| Ok(Some(create_test_user(user_id, UserRole::Client))));
    repo.expect_update_profile()
        .times(1)
        .returning(|id, _, _| Ok(create_test_user(id, UserRole::Client)));

    let service = UserManager::new(Arc::new(TestUnitOfWork::with_users(repo)));
    let result = service
        .update_profile(user_id, "Test".to_string(), "test@example.com".to_string())
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_update_profile_requires_fields() {
    let service = UserManager::new(Arc::new(TestUnitOfWork::default()));
    let result = service
        .update_profile(Uuid::new_v4(), "   ".to_string(), "a@b.com".to_string())
        .await;

    assert!(matches!(result.unwrap_err(), AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_change_password_checks_current() {
    let user = user_with_password(UserRole::Client);
    let user_id = user.id;

    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id()
        .returning(move |_| Ok(Some(user.clone())));
    repo.expect_update_password().never();

    let service = UserManager::new(Arc::new(TestUnitOfWork::with_users(repo)));
    let result = service
        .change_password(user_id, "wrong password".to_string(), "new password 1".to_string())
        .await;

    match result {
        Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Current password is incorrect"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_change_password_stores_new_hash() {
    let user = user_with_password(UserRole::Client);
    let user_id = user.id;

    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id()
        .returning(move |_| Ok(Some(user.clone())));
    repo.expect_update_password()
        .withf(move |id, hash| {
            *id == user_id && Password::from_hash(hash.clone()).verify("new password 1")
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let service = UserManager::new(Arc::new(TestUnitOfWork::with_users(repo)));
    let result = service
        .change_password(
            user_id,
            TEST_PASSWORD.to_string(),
            "new password 1".to_string(),
        )
        .await;

    assert!(result.is_ok());
}

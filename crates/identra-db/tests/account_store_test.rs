use chrono::Utc;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

use identra_core::error::StoreError;
use identra_core::models::account::{Account, Claim, ExternalLogin};
use identra_core::models::role::Role;
use identra_core::store::{AccountFilter, AccountStore, Pagination, RoleStore, normalize_key};
use identra_db::StoreConfig;
use identra_db::repository::{SurrealAccountStore, SurrealRoleStore};

async fn setup() -> (SurrealAccountStore<Db>, SurrealRoleStore<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    identra_db::run_migrations(&db, &StoreConfig::default())
        .await
        .unwrap();

    let roles = SurrealRoleStore::new(db.clone());
    let accounts = SurrealAccountStore::new(db, roles.clone());
    (accounts, roles)
}

#[tokio::test]
async fn create_and_find_by_id_round_trip() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::with_email("Alice", "Alice@example.com");
    account.password_hash = Some("hash-1".to_string());
    account.phone_number = Some("+15550100".to_string());
    account.phone_number_confirmed = true;
    account.two_factor_enabled = true;
    account.set_lockout_enabled(true);
    account.add_claim(Claim::new("scope", "read"));
    account.add_claim(Claim::new("scope", "write"));
    account.add_login(ExternalLogin::new("github", "gh-1", Some("GitHub".to_string())));
    account.set_token("github", "refresh", "tok-1");
    account.add_role("admin");

    accounts.create(&mut account).await.unwrap();

    let found = accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(found, account);
}

#[tokio::test]
async fn minimal_account_round_trips_with_empty_collections() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("carol");
    accounts.create(&mut account).await.unwrap();

    let found = accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(found, account);
    assert!(found.claims().is_empty());
    assert!(found.logins().is_empty());
    assert!(found.tokens().is_empty());
    assert!(found.roles().is_empty());
}

#[tokio::test]
async fn create_assigns_id_when_nil() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::default();
    account.user_name = "dave".to_string();
    account.normalized_user_name = normalize_key("dave");
    assert!(account.id.is_nil());

    accounts.create(&mut account).await.unwrap();
    assert!(!account.id.is_nil());
    assert!(accounts.find_by_id(account.id).await.unwrap().is_some());
}

#[tokio::test]
async fn create_with_existing_id_is_rejected() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("erin");
    accounts.create(&mut account).await.unwrap();

    let mut duplicate = Account::new("erin-again");
    duplicate.id = account.id;
    let err = accounts.create(&mut duplicate).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn normalized_lookups_match_case_folded_keys() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::with_email("Frank", "Frank@Example.com");
    accounts.create(&mut account).await.unwrap();

    let by_name = accounts
        .find_by_user_name(&normalize_key("frank"))
        .await
        .unwrap();
    assert_eq!(by_name.map(|a| a.id), Some(account.id));

    let by_email = accounts
        .find_by_email(&normalize_key("frank@example.com"))
        .await
        .unwrap();
    assert_eq!(by_email.map(|a| a.id), Some(account.id));

    assert!(accounts.find_by_user_name("NOBODY").await.unwrap().is_none());
    assert!(
        accounts
            .find_by_email("NOBODY@EXAMPLE.COM")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn delete_removes_account_and_is_strict() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("gina");
    accounts.create(&mut account).await.unwrap();

    accounts.delete(&account).await.unwrap();
    assert!(accounts.find_by_id(account.id).await.unwrap().is_none());

    let err = accounts.delete(&account).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn update_persists_staged_collection_changes() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("grace");
    accounts.create(&mut account).await.unwrap();
    let stamp_at_create = account.concurrency_stamp.clone();

    account.add_claim(Claim::new("dept", "eng"));
    account.set_token("github", "refresh", "tok");
    account.add_role("staff");
    accounts.update(&mut account).await.unwrap();
    assert_ne!(account.concurrency_stamp, stamp_at_create);

    let found = accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(found, account);
    assert_eq!(found.token("github", "refresh"), Some("tok"));
}

#[tokio::test]
async fn scalar_fields_round_trip_through_update() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("bob");
    accounts.create(&mut account).await.unwrap();

    account.email = Some("Bob@Example.com".to_string());
    account.normalized_email = Some(normalize_key("Bob@Example.com"));
    account.email_confirmed = true;
    account.set_lockout_enabled(true);
    account.set_lockout_end(Some(Utc::now() + chrono::Duration::minutes(15)));
    account.increment_access_failed_count();
    account.increment_access_failed_count();

    accounts.update(&mut account).await.unwrap();

    let found = accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(found, account);
    assert_eq!(found.access_failed_count(), 2);
    assert_eq!(found.lockout_end(), account.lockout_end());
}

#[tokio::test]
async fn update_of_missing_account_is_not_found() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("henry");
    let err = accounts.update(&mut account).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_claim_is_stored_once() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("hana");
    accounts.create(&mut account).await.unwrap();

    account.add_claim(Claim::new("scope", "read"));
    account.add_claim(Claim::new("scope", "read"));
    accounts.update(&mut account).await.unwrap();

    let found = accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(found.claims(), [Claim::new("scope", "read")]);
}

#[tokio::test]
async fn accounts_for_claim_returns_all_holders() {
    let (accounts, _roles) = setup().await;
    let shared = Claim::new("scope", "audit");

    let mut holder_a = Account::new("iris");
    holder_a.add_claim(shared.clone());
    accounts.create(&mut holder_a).await.unwrap();

    let mut holder_b = Account::new("jack");
    holder_b.add_claim(shared.clone());
    holder_b.add_claim(Claim::new("scope", "other"));
    accounts.create(&mut holder_b).await.unwrap();

    let mut bystander = Account::new("kate");
    bystander.add_claim(Claim::new("scope", "other"));
    accounts.create(&mut bystander).await.unwrap();

    let holders = accounts.accounts_for_claim(&shared).await.unwrap();
    let mut names: Vec<_> = holders.iter().map(|a| a.user_name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["iris", "jack"]);
}

#[tokio::test]
async fn add_login_rejects_key_bound_to_other_account() {
    let (accounts, _roles) = setup().await;

    let mut owner = Account::new("lena");
    accounts.create(&mut owner).await.unwrap();
    accounts
        .add_login(&mut owner, ExternalLogin::new("github", "gh-7", None))
        .await
        .unwrap();
    accounts.update(&mut owner).await.unwrap();

    let mut intruder = Account::new("mike");
    accounts.create(&mut intruder).await.unwrap();
    let err = accounts
        .add_login(&mut intruder, ExternalLogin::new("github", "gh-7", None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert!(intruder.logins().is_empty());
}

#[tokio::test]
async fn readding_own_login_refreshes_display_name() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("nina");
    accounts.create(&mut account).await.unwrap();
    accounts
        .add_login(
            &mut account,
            ExternalLogin::new("github", "gh-1", Some("GitHub".to_string())),
        )
        .await
        .unwrap();
    accounts.update(&mut account).await.unwrap();

    accounts
        .add_login(
            &mut account,
            ExternalLogin::new("github", "gh-2", Some("GitHub (work)".to_string())),
        )
        .await
        .unwrap();
    accounts.update(&mut account).await.unwrap();

    let found = accounts.find_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(found.logins().len(), 1);
    assert_eq!(found.logins()[0].provider_key, "gh-1");
    assert_eq!(
        found.logins()[0].provider_display_name.as_deref(),
        Some("GitHub (work)")
    );
}

#[tokio::test]
async fn find_by_login_resolves_owner_until_removed() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("olga");
    accounts.create(&mut account).await.unwrap();
    accounts
        .add_login(&mut account, ExternalLogin::new("google", "g-1", None))
        .await
        .unwrap();
    accounts.update(&mut account).await.unwrap();

    let owner = accounts.find_by_login("google", "g-1").await.unwrap();
    assert_eq!(owner.map(|a| a.id), Some(account.id));

    account.remove_login("google", "g-1");
    accounts.update(&mut account).await.unwrap();

    assert!(
        accounts
            .find_by_login("google", "g-1")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn add_to_role_requires_existing_role() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("pete");
    accounts.create(&mut account).await.unwrap();

    let err = accounts.add_to_role(&mut account, "ghost").await.unwrap_err();
    assert!(matches!(err, StoreError::RoleNotFound { ref name } if name == "ghost"));
    assert!(account.roles().is_empty());
}

#[tokio::test]
async fn add_to_role_rejects_blank_name() {
    let (accounts, _roles) = setup().await;

    let mut account = Account::new("sven");
    accounts.create(&mut account).await.unwrap();

    let err = accounts.add_to_role(&mut account, "   ").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));
    assert!(account.roles().is_empty());
}

#[tokio::test]
async fn add_to_role_stores_canonical_name() {
    let (accounts, roles) = setup().await;

    let mut role = Role::new("Admin");
    roles.create(&mut role).await.unwrap();

    let mut account = Account::new("quinn");
    accounts.create(&mut account).await.unwrap();
    accounts.add_to_role(&mut account, "aDmIn").await.unwrap();
    assert_eq!(account.roles(), ["Admin"]);
    accounts.update(&mut account).await.unwrap();

    let members = accounts.accounts_in_role("Admin").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, account.id);
    // Membership queries match the stored name exactly.
    assert!(accounts.accounts_in_role("ADMIN").await.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_account_leaves_reverse_queries() {
    let (accounts, roles) = setup().await;

    let mut role = Role::new("auditor");
    roles.create(&mut role).await.unwrap();

    let shared = Claim::new("scope", "audit");
    let mut keep = Account::new("rosa");
    keep.add_claim(shared.clone());
    accounts.create(&mut keep).await.unwrap();
    accounts.add_to_role(&mut keep, "auditor").await.unwrap();
    accounts.update(&mut keep).await.unwrap();

    let mut gone = Account::new("sam");
    gone.add_claim(shared.clone());
    accounts.create(&mut gone).await.unwrap();
    accounts.add_to_role(&mut gone, "auditor").await.unwrap();
    accounts.update(&mut gone).await.unwrap();

    accounts.delete(&gone).await.unwrap();

    let claim_holders = accounts.accounts_for_claim(&shared).await.unwrap();
    assert_eq!(claim_holders.len(), 1);
    assert_eq!(claim_holders[0].id, keep.id);

    let members = accounts.accounts_in_role("auditor").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, keep.id);
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let (accounts, _roles) = setup().await;

    let seed = [
        ("ann", true),
        ("bea", false),
        ("cal", true),
        ("dot", false),
        ("eli", true),
    ];
    for (name, confirmed) in seed {
        let mut account = Account::new(name);
        account.email_confirmed = confirmed;
        accounts.create(&mut account).await.unwrap();
    }

    let all = accounts
        .list(AccountFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 5);
    let names: Vec<_> = all.items.iter().map(|a| a.user_name.as_str()).collect();
    assert_eq!(names, ["ann", "bea", "cal", "dot", "eli"]);

    let confirmed = accounts
        .list(
            AccountFilter {
                email_confirmed: Some(true),
                ..AccountFilter::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(confirmed.total, 3);
    assert!(confirmed.items.iter().all(|a| a.email_confirmed));

    let page = accounts
        .list(AccountFilter::default(), Pagination { offset: 2, limit: 2 })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    let names: Vec<_> = page.items.iter().map(|a| a.user_name.as_str()).collect();
    assert_eq!(names, ["cal", "dot"]);
}

#[tokio::test]
async fn list_combines_filters() {
    let (accounts, _roles) = setup().await;

    let seed = [("uma", true, true), ("val", true, false), ("wes", false, true)];
    for (name, confirmed, two_factor) in seed {
        let mut account = Account::new(name);
        account.email_confirmed = confirmed;
        account.two_factor_enabled = two_factor;
        accounts.create(&mut account).await.unwrap();
    }

    let result = accounts
        .list(
            AccountFilter {
                email_confirmed: Some(true),
                two_factor_enabled: Some(true),
                ..AccountFilter::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.items[0].user_name, "uma");
}

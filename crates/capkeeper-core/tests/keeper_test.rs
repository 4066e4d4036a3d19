//! Ownership operations through scoped keepers

use std::sync::Arc;

use capkeeper_core::{
    CapabilityError, CapabilityOwners, Context, Keeper, MemStore, Owner, ScopedKeeper, SharedMeter,
};
use capkeeper_db::{Database, MemoryDb};

struct Fixture {
    keeper: Keeper,
    ctx: Context,
    bank: ScopedKeeper,
    staking: ScopedKeeper,
}

fn fixture() -> Fixture {
    let keeper = Keeper::new("capability", Arc::new(MemStore::new()));
    let bank = keeper.scope_to_module("bank").unwrap();
    let staking = keeper.scope_to_module("staking").unwrap();
    keeper.seal().unwrap();
    let ctx = Context::new(Arc::new(MemoryDb::new()));
    keeper.initialize_mem_store(&ctx).unwrap();
    Fixture { keeper, ctx, bank, staking }
}

#[test]
fn test_new_then_get_returns_same_handle() {
    let f = fixture();
    let cap = f.bank.new_capability(&f.ctx, "transfer").unwrap();
    let got = f.bank.get_capability(&f.ctx, "transfer").unwrap().unwrap();
    assert!(got.same_handle(&cap));
    assert_eq!(f.staking.get_capability(&f.ctx, "transfer").unwrap(), None);
}

#[test]
fn test_claim_and_authenticate() {
    let f = fixture();
    let cap = f.bank.new_capability(&f.ctx, "transfer").unwrap();
    f.staking.claim_capability(&f.ctx, &cap, "transfer").unwrap();

    assert!(f.staking.authenticate_capability(&cap, "transfer"));
    assert!(f.bank.authenticate_capability(&cap, "transfer"));

    let owners = f.keeper.get_owners(&f.ctx, cap.index()).unwrap().unwrap();
    assert_eq!(
        owners,
        CapabilityOwners::from_owners(vec![Owner::new("bank", "transfer"), Owner::new("staking", "transfer")])
    );
    let modules: Vec<String> = f.keeper.lookup_modules(&f.ctx, cap.index()).unwrap().into_iter().collect();
    assert_eq!(modules, vec!["bank".to_string(), "staking".to_string()]);
}

#[test]
fn test_claim_of_taken_name_leaves_state_unchanged() {
    let f = fixture();
    let first = f.bank.new_capability(&f.ctx, "first").unwrap();
    let second = f.bank.new_capability(&f.ctx, "second").unwrap();
    f.staking.claim_capability(&f.ctx, &first, "held").unwrap();

    let err = f.staking.claim_capability(&f.ctx, &second, "held").unwrap_err();
    assert_eq!(err, CapabilityError::owner_already_exists("staking", "held"));

    assert_eq!(
        f.keeper.get_owners(&f.ctx, second.index()).unwrap(),
        Some(CapabilityOwners::single(Owner::new("bank", "second")))
    );
    assert!(f.staking.get_capability(&f.ctx, "held").unwrap().unwrap().same_handle(&first));
    assert!(!f.staking.authenticate_capability(&second, "held"));

    // claiming twice under the same name is rejected the same way
    let err = f.staking.claim_capability(&f.ctx, &first, "held").unwrap_err();
    assert_eq!(err, CapabilityError::owner_already_exists("staking", "held"));
}

#[test]
fn test_claim_of_released_capability() {
    let f = fixture();
    let cap = f.bank.new_capability(&f.ctx, "transfer").unwrap();
    f.bank.release_capability(&f.ctx, &cap, "transfer").unwrap();

    let err = f.staking.claim_capability(&f.ctx, &cap, "transfer").unwrap_err();
    assert!(matches!(err, CapabilityError::NotFound(_)));
}

#[test]
fn test_release_then_get_returns_none() {
    let f = fixture();
    let cap = f.bank.new_capability(&f.ctx, "transfer").unwrap();
    f.staking.claim_capability(&f.ctx, &cap, "transfer").unwrap();

    f.bank.release_capability(&f.ctx, &cap, "transfer").unwrap();
    assert_eq!(f.bank.get_capability(&f.ctx, "transfer").unwrap(), None);
    assert!(!f.bank.authenticate_capability(&cap, "transfer"));

    // the other owner still holds it
    assert!(f.staking.authenticate_capability(&cap, "transfer"));
    assert_eq!(f.keeper.get_owners(&f.ctx, cap.index()).unwrap().unwrap().len(), 1);

    f.staking.release_capability(&f.ctx, &cap, "transfer").unwrap();
    assert_eq!(f.keeper.get_owners(&f.ctx, cap.index()).unwrap(), None);

    let err = f.staking.release_capability(&f.ctx, &cap, "transfer").unwrap_err();
    assert_eq!(err, CapabilityError::not_owner("staking", "transfer"));
}

#[test]
fn test_name_can_be_recreated_after_release() {
    let f = fixture();
    let old = f.bank.new_capability(&f.ctx, "transfer").unwrap();
    f.bank.release_capability(&f.ctx, &old, "transfer").unwrap();

    let new = f.bank.new_capability(&f.ctx, "transfer").unwrap();
    assert!(new.index() > old.index());
    assert!(!f.bank.authenticate_capability(&old, "transfer"));
    assert!(f.bank.authenticate_capability(&new, "transfer"));
}

#[test]
fn test_dropped_branch_keeps_volatile_writes() {
    let f = fixture();

    let (child, branch) = f.ctx.branch();
    let cap = f.bank.new_capability(&child, "transfer").unwrap();
    branch.discard().unwrap();

    assert_eq!(f.keeper.get_owners(&f.ctx, cap.index()).unwrap(), None);
    assert_eq!(f.keeper.latest_index(&f.ctx).unwrap(), 0);
    // the handle stays cached but is no longer backed by an owner record
    assert!(f.bank.authenticate_capability(&cap, "transfer"));
    assert_eq!(f.bank.get_capability(&f.ctx, "transfer").unwrap(), None);
}

#[test]
fn test_dropped_branch_claim_is_not_owned() {
    let f = fixture();
    let cap = f.bank.new_capability(&f.ctx, "transfer").unwrap();

    let (child, branch) = f.ctx.branch();
    f.staking.claim_capability(&child, &cap, "transfer").unwrap();
    branch.discard().unwrap();

    assert_eq!(f.staking.get_capability(&f.ctx, "transfer").unwrap(), None);
    assert!(f.bank.get_capability(&f.ctx, "transfer").unwrap().unwrap().same_handle(&cap));
    assert_eq!(
        f.keeper.get_owners(&f.ctx, cap.index()).unwrap(),
        Some(CapabilityOwners::single(Owner::new("bank", "transfer")))
    );
}

#[test]
fn test_committed_branch_is_durable() {
    let f = fixture();

    let (child, branch) = f.ctx.branch();
    let cap = f.bank.new_capability(&child, "transfer").unwrap();
    assert_eq!(f.keeper.get_owners(&f.ctx, cap.index()).unwrap(), None);
    branch.commit().unwrap();

    assert!(f.keeper.get_owners(&f.ctx, cap.index()).unwrap().is_some());
    assert_eq!(f.keeper.latest_index(&f.ctx).unwrap(), 1);
}

#[test]
fn test_out_of_gas_leaves_volatile_cache_untouched() {
    let f = fixture();
    let metered = f.ctx.clone().with_gas_meter(SharedMeter::limited(3000));

    let (child, branch) = metered.branch();
    let err = f.bank.new_capability(&child, "transfer").unwrap_err();
    assert!(matches!(err, CapabilityError::Meter(_)));
    drop(branch);

    assert_eq!(f.bank.get_capability(&f.ctx, "transfer").unwrap(), None);
    assert_eq!(f.keeper.latest_index(&f.ctx).unwrap(), 0);
}

#[test]
fn test_operations_charge_the_caller() {
    let f = fixture();
    let metered = f.ctx.clone().with_gas_meter(SharedMeter::limited(1_000_000));

    let cap = f.bank.new_capability(&metered, "transfer").unwrap();
    let after_create = metered.gas_meter().consumed();
    assert!(after_create > 0);

    // a lookup reads the owner record, authentication reads only the cache
    f.bank.get_capability(&metered, "transfer").unwrap().unwrap();
    let after_get = metered.gas_meter().consumed();
    assert!(after_get > after_create);
    assert!(f.bank.authenticate_capability(&cap, "transfer"));
    assert_eq!(metered.gas_meter().consumed(), after_get);
}

#[test]
fn test_stores_are_namespaced_by_store_key() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let ctx = Context::new(db.clone());

    let a = Keeper::new("caps_a", Arc::new(MemStore::new()));
    let b = Keeper::new("caps_b", Arc::new(MemStore::new()));
    a.new_capability(&ctx, "bank", "transfer").unwrap();

    assert_eq!(b.latest_index(&ctx).unwrap(), 0);
    assert!(b.new_capability(&ctx, "bank", "transfer").is_ok());
    assert!(db.contains(b"caps_a/index").unwrap());
}

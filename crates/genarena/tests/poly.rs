//! Integration tests: polymorphic dispatch over a four-type hierarchy.
//!
//! The hierarchy is `A ⊃ {B ⊃ {C}, D}`, numbered pre-order so every
//! type's subtypes occupy a contiguous id range:
//!
//! ```text
//! id:  0  1  2  3
//!      A  B  C  D        A spans [0, 4), B spans [1, 3)
//! ```
//!
//! Each subtype leads with its base struct under `#[repr(C)]`, which is
//! the layout-prefix contract the `iter_poly`/`get_dyn` family requires.

#![cfg(feature = "poly-dispatch")]

use genarena::{PolyArenas, TypeKey, TypedRef};

#[repr(C)]
struct A {
    id: u32,
}
impl TypeKey for A {
    const TYPE_ID: u32 = 0;
    const SUBTYPE_END: u32 = 4;
}

#[repr(C)]
struct B {
    base: A,
    b_payload: u32,
}
impl TypeKey for B {
    const TYPE_ID: u32 = 1;
    const SUBTYPE_END: u32 = 3;
}

#[repr(C)]
struct C {
    base: B,
    c_payload: u32,
}
impl TypeKey for C {
    const TYPE_ID: u32 = 2;
    const SUBTYPE_END: u32 = 3;
}

#[repr(C)]
struct D {
    base: A,
    d_payload: u32,
}
impl TypeKey for D {
    const TYPE_ID: u32 = 3;
    const SUBTYPE_END: u32 = 4;
}

fn populated_world() -> (PolyArenas, Vec<TypedRef<C>>) {
    let mut world = PolyArenas::new(4);
    world.register::<A>(4).unwrap();
    world.register::<B>(4).unwrap();
    world.register::<C>(4).unwrap();
    world.register::<D>(4).unwrap();

    let mut c_refs = Vec::new();
    for i in 0..10u32 {
        world.insert(A { id: i });
        world.insert(B {
            base: A { id: 100 + i },
            b_payload: i,
        });
        c_refs.push(world.insert(C {
            base: B {
                base: A { id: 200 + i },
                b_payload: i,
            },
            c_payload: i,
        }));
        world.insert(D {
            base: A { id: 300 + i },
            d_payload: i,
        });
    }
    (world, c_refs)
}

#[test]
fn static_iteration_sees_one_arena() {
    let (world, _) = populated_world();
    assert_eq!(world.iter::<A>().count(), 10);
    assert_eq!(world.iter::<B>().count(), 10);
    assert_eq!(world.len::<C>(), 10);
    assert_eq!(world.len::<D>(), 10);
}

#[test]
fn poly_iteration_spans_subtype_ranges() {
    let (world, _) = populated_world();

    // SAFETY: pre-order ids; every subtype leads with its base struct.
    let all: Vec<u32> = unsafe { world.iter_poly::<A>() }.map(|a| a.id).collect();
    assert_eq!(all.len(), 40);

    let b_and_c = unsafe { world.iter_poly::<B>() }.count();
    assert_eq!(b_and_c, 20);

    let only_c = unsafe { world.iter_poly::<C>() }.count();
    assert_eq!(only_c, 10);

    let only_d = unsafe { world.iter_poly::<D>() }.count();
    assert_eq!(only_d, 10);

    // Base-prefix reads see each subtype's embedded A.
    assert!(all.contains(&0));
    assert!(all.contains(&105));
    assert!(all.contains(&207));
    assert!(all.contains(&309));
}

#[test]
fn subtype_handle_resolves_as_base_in_dynamic_mode() {
    let (mut world, c_refs) = populated_world();
    let c_handle = c_refs[4];

    let as_a: TypedRef<A> = c_handle.cast();
    assert_eq!(as_a.type_id(), C::TYPE_ID);
    assert!(world.is_valid_dyn(as_a));

    // SAFETY: C leads with B which leads with A, all #[repr(C)].
    let a_view = unsafe { world.get_dyn(as_a) };
    assert_eq!(a_view.id, 204);

    // After the C value is released, the base-typed view dies with it.
    world.release(c_handle).unwrap();
    assert!(!world.is_valid_dyn(as_a));
    assert!(unsafe { world.try_get_dyn(as_a) }.is_none());
}

#[test]
fn poly_handles_round_trip_through_dyn_lookup() {
    let (world, _) = populated_world();
    // SAFETY: as above.
    let pairs: Vec<(TypedRef<A>, u32)> = unsafe { world.iter_poly_with_refs::<A>() }
        .map(|(r, a)| (r, a.id))
        .collect();
    assert_eq!(pairs.len(), 40);
    for (r, id) in pairs {
        assert!(world.is_valid_dyn(r));
        // SAFETY: as above.
        assert_eq!(unsafe { world.get_dyn(r) }.id, id);
    }
}

#[test]
fn unregistered_ids_in_range_are_skipped() {
    let mut world = PolyArenas::new(4);
    world.register::<A>(0).unwrap();
    world.register::<D>(0).unwrap();
    world.insert(A { id: 1 });
    world.insert(D {
        base: A { id: 2 },
        d_payload: 0,
    });

    // B and C were never registered; the A-range walk skips their slots.
    // SAFETY: the registered types in [0, 4) lead with A.
    let ids: Vec<u32> = unsafe { world.iter_poly::<A>() }.map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

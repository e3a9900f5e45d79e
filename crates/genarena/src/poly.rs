//! Type-keyed collection of raw arenas.
//!
//! [`PolyArenas`] holds one raw arena per type id in `[0, max_types)`.
//! Every per-type operation is dispatched through [`TypeKey::TYPE_ID`],
//! and the id is stamped into each handle, so a handle always remembers
//! which arena minted it.
//!
//! With the `poly-dispatch` feature, a second lookup family resolves
//! through the id *carried by the handle* instead of the static type.
//! That permits a handle held as a base type to reach its subtype's
//! arena, and enables iteration over a contiguous subtype id range
//! (`iter_poly`). Those views reinterpret element prefixes and are
//! `unsafe`; see the safety contract on `iter_poly`.

use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

use crate::arena_log;
use crate::config::{DefaultConfig, HandleConfig};
use crate::error::ArenaError;
use crate::handle::{Ref, TypedRef};
use crate::key::TypeKey;
use crate::raw::RawArena;

/// Drops the pointee as `T`. Monomorphized at registration, when the
/// concrete element type is last known.
unsafe fn drop_shim<T>(ptr: NonNull<u8>) {
    // SAFETY: the caller passes a pointer to an initialised T.
    unsafe { std::ptr::drop_in_place(ptr.cast::<T>().as_ptr()) };
}

struct PolyEntry<C: HandleConfig> {
    arena: RawArena<C>,
    /// Set when the registered type needs dropping; used to drain on
    /// collection drop.
    drop_fn: Option<unsafe fn(NonNull<u8>)>,
}

/// A fixed-size table of generational arenas, one per type id.
///
/// Types must be registered before use; registration fixes the element
/// layout for that id and captures how leftovers are dropped. Unlike
/// [`crate::Arena`], this collection is neither `Send` nor `Sync` — it
/// can hold elements of any registered type, so it cannot promise more
/// than the least capable of them.
///
/// ```
/// use genarena::{PolyArenas, TypeKey};
///
/// struct Enemy { hp: u32 }
/// impl TypeKey for Enemy {
///     const TYPE_ID: u32 = 0;
/// }
///
/// let mut world = PolyArenas::new(4);
/// world.register::<Enemy>(16).unwrap();
/// let orc = world.insert(Enemy { hp: 7 });
/// assert_eq!(world.get(orc).hp, 7);
/// assert_eq!(orc.type_id(), 0);
/// ```
pub struct PolyArenas<C: HandleConfig = DefaultConfig> {
    entries: Vec<Option<PolyEntry<C>>>,
}

impl PolyArenas<DefaultConfig> {
    /// Create a collection with room for `max_types` type ids under the
    /// default handle layout, none of them registered yet.
    ///
    /// # Panics
    ///
    /// As for [`PolyArenas::with_config`].
    pub fn new(max_types: u32) -> Self {
        Self::with_config(max_types)
    }
}

impl<C: HandleConfig> PolyArenas<C> {
    /// Create a collection with room for `max_types` type ids under a
    /// custom handle layout, none of them registered yet.
    ///
    /// # Panics
    ///
    /// Panics if `max_types` exceeds what the handle's type id field can
    /// represent.
    pub fn with_config(max_types: u32) -> Self {
        assert!(
            u64::from(max_types) <= Ref::<C>::TYPE_ID_MASK + 1,
            "max_types {max_types} exceeds the handle type id field"
        );
        Self {
            entries: (0..max_types).map(|_| None).collect(),
        }
    }

    /// Number of type ids this collection can hold.
    pub fn max_types(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Register `T`'s arena with an initial capacity.
    ///
    /// # Panics
    ///
    /// Panics if `T::TYPE_ID` is out of range or already registered.
    pub fn register<T: TypeKey>(&mut self, capacity: u32) -> Result<(), ArenaError> {
        let tid = self.checked_type_id::<T>();
        assert!(
            self.entries[tid as usize].is_none(),
            "type id {tid} registered twice"
        );
        let arena = RawArena::with_capacity(
            capacity,
            mem::size_of::<T>(),
            mem::align_of::<T>(),
            tid,
        )?;
        let drop_fn = if mem::needs_drop::<T>() {
            Some(drop_shim::<T> as unsafe fn(NonNull<u8>))
        } else {
            None
        };
        self.entries[tid as usize] = Some(PolyEntry { arena, drop_fn });
        Ok(())
    }

    /// Whether `T`'s arena has been registered.
    pub fn is_registered<T: TypeKey>(&self) -> bool {
        let tid = self.checked_type_id::<T>();
        self.entries[tid as usize].is_some()
    }

    /// Number of live values of type `T`.
    pub fn len<T: TypeKey>(&self) -> u32 {
        self.entry::<T>().arena.len()
    }

    /// Whether no values of type `T` are live.
    pub fn is_empty<T: TypeKey>(&self) -> bool {
        self.entry::<T>().arena.is_empty()
    }

    /// Element capacity of `T`'s arena.
    pub fn capacity<T: TypeKey>(&self) -> u32 {
        self.entry::<T>().arena.capacity()
    }

    /// Reallocate `T`'s arena to hold `new_capacity` values.
    pub fn resize<T: TypeKey>(&mut self, new_capacity: u32) -> Result<(), ArenaError> {
        self.entry_mut::<T>().arena.resize(new_capacity)
    }

    /// Shrink `T`'s arena to the smallest power of two holding its live
    /// values.
    pub fn shrink<T: TypeKey>(&mut self) -> Result<(), ArenaError> {
        self.entry_mut::<T>().arena.shrink()
    }

    /// Insert a value into `T`'s arena.
    ///
    /// # Panics
    ///
    /// Panics if `T` is unregistered or allocation fails.
    pub fn insert<T: TypeKey>(&mut self, value: T) -> TypedRef<T, C> {
        match self.try_insert(value) {
            Ok(r) => r,
            Err(err) => panic!("poly arena insert failed: {err}"),
        }
    }

    /// Insert a value into `T`'s arena, surfacing allocation failure.
    /// The value is dropped if no slot could be acquired.
    pub fn try_insert<T: TypeKey>(&mut self, value: T) -> Result<TypedRef<T, C>, ArenaError> {
        let arena = &mut self.entry_mut::<T>().arena;
        let (r, ptr) = match arena.insert_empty() {
            Ok(pair) => pair,
            Err(err) => {
                arena_log!(
                    "poly arena insert failed: {err} (type id {})",
                    T::TYPE_ID
                );
                return Err(err);
            }
        };
        // SAFETY: the slot was sized and aligned for T at registration.
        unsafe { ptr.cast::<T>().as_ptr().write(value) };
        Ok(TypedRef::from_raw(r))
    }

    /// Insert a value built by `f`, which receives the handle the value
    /// will live under.
    ///
    /// # Panics
    ///
    /// Panics if `T` is unregistered or allocation fails.
    pub fn insert_with<T: TypeKey>(
        &mut self,
        f: impl FnOnce(TypedRef<T, C>) -> T,
    ) -> TypedRef<T, C> {
        let pending = TypedRef::from_raw(self.entry::<T>().arena.next_ref());
        let value = f(pending);
        let r = self.insert(value);
        debug_assert_eq!(r, pending);
        r
    }

    /// Release the value named by `r` from `T`'s arena, returning it.
    ///
    /// Always statically dispatched: moving the value out requires the
    /// concrete type, so a handle must be released as the type it was
    /// inserted under.
    pub fn release<T: TypeKey>(&mut self, r: TypedRef<T, C>) -> Result<T, ArenaError> {
        let arena = &mut self.entry_mut::<T>().arena;
        let mut value = MaybeUninit::<T>::uninit();
        let result = arena.release_with(r.raw(), |ptr| {
            // SAFETY: the deleter runs exactly once on the victim's
            // bytes, which hold an initialised T.
            unsafe { value.write(ptr.cast::<T>().as_ptr().read()) };
        });
        match result {
            // SAFETY: release succeeded, so the deleter initialised
            // `value`.
            Ok(()) => Ok(unsafe { value.assume_init() }),
            Err(err) => {
                arena_log!("poly arena release failed: {err} (type id {})", T::TYPE_ID);
                Err(err)
            }
        }
    }

    /// Whether `r` names a live value in `T`'s arena (static dispatch).
    pub fn is_valid<T: TypeKey>(&self, r: TypedRef<T, C>) -> bool {
        self.entry::<T>().arena.is_valid(r.raw())
    }

    /// Borrow the value named by `r`, which must be live in `T`'s arena.
    ///
    /// # Panics
    ///
    /// Panics if `T` is unregistered or the handle is stale or forged.
    pub fn get<T: TypeKey>(&self, r: TypedRef<T, C>) -> &T {
        let ptr = self.entry::<T>().arena.get(r.raw());
        // SAFETY: validated live slot of T's own arena.
        unsafe { &*ptr.cast::<T>().as_ptr() }
    }

    /// Mutably borrow the value named by `r`, which must be live in
    /// `T`'s arena.
    ///
    /// # Panics
    ///
    /// Panics if `T` is unregistered or the handle is stale or forged.
    pub fn get_mut<T: TypeKey>(&mut self, r: TypedRef<T, C>) -> &mut T {
        let ptr = self.entry::<T>().arena.get(r.raw());
        // SAFETY: as in `get`; `&mut self` guarantees exclusivity.
        unsafe { &mut *ptr.cast::<T>().as_ptr() }
    }

    /// Borrow the value named by `r`, or `None` if the handle is stale
    /// or forged.
    pub fn try_get<T: TypeKey>(&self, r: TypedRef<T, C>) -> Option<&T> {
        let ptr = self.entry::<T>().arena.try_get(r.raw())?;
        // SAFETY: as in `get`.
        Some(unsafe { &*ptr.cast::<T>().as_ptr() })
    }

    /// Mutably borrow the value named by `r`, or `None` if the handle is
    /// stale or forged.
    pub fn try_get_mut<T: TypeKey>(&mut self, r: TypedRef<T, C>) -> Option<&mut T> {
        let ptr = self.entry_mut::<T>().arena.try_get(r.raw())?;
        // SAFETY: as in `get_mut`.
        Some(unsafe { &mut *ptr.cast::<T>().as_ptr() })
    }

    /// Dense position of the value named by `r` within `T`'s arena.
    ///
    /// # Panics
    ///
    /// Panics if `T` is unregistered or the handle is stale or forged.
    pub fn dense_index<T: TypeKey>(&self, r: TypedRef<T, C>) -> u32 {
        self.entry::<T>().arena.dense_index(r.raw())
    }

    /// Iterate over the live values of type `T` in dense order.
    pub fn iter<'a, T: TypeKey + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        let arena = &self.entry::<T>().arena;
        (0..arena.len()).map(move |dense| {
            // SAFETY: the dense prefix of T's own arena holds
            // initialised T values.
            unsafe { &*arena.item_ptr(dense).cast::<T>().as_ptr() }
        })
    }

    /// Iterate over `(handle, value)` pairs of type `T` in dense order.
    pub fn iter_with_refs<'a, T: TypeKey + 'a>(
        &'a self,
    ) -> impl Iterator<Item = (TypedRef<T, C>, &'a T)> {
        let arena = &self.entry::<T>().arena;
        (0..arena.len()).map(move |dense| {
            let r = TypedRef::from_raw(arena.ref_at(dense));
            // SAFETY: as in `iter`.
            let value = unsafe { &*arena.item_ptr(dense).cast::<T>().as_ptr() };
            (r, value)
        })
    }

    fn checked_type_id<T: TypeKey>(&self) -> u32 {
        let tid = T::TYPE_ID;
        assert!(
            tid < self.max_types(),
            "type id {tid} out of range (max_types = {})",
            self.max_types()
        );
        tid
    }

    fn entry<T: TypeKey>(&self) -> &PolyEntry<C> {
        let tid = self.checked_type_id::<T>();
        self.entries[tid as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("type id {tid} is not registered"))
    }

    fn entry_mut<T: TypeKey>(&mut self) -> &mut PolyEntry<C> {
        let tid = self.checked_type_id::<T>();
        self.entries[tid as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("type id {tid} is not registered"))
    }
}

#[cfg(feature = "poly-dispatch")]
impl<C: HandleConfig> PolyArenas<C> {
    /// Whether `r` names a live value, resolving through the type id the
    /// handle carries rather than the static type. This is how a handle
    /// held as a base type validates against its subtype's arena.
    pub fn is_valid_dyn<T: TypeKey>(&self, r: TypedRef<T, C>) -> bool {
        match self.entries.get(r.type_id() as usize) {
            Some(Some(entry)) => entry.arena.is_valid(r.raw()),
            _ => false,
        }
    }

    /// Dense position of the value named by `r` within the arena the
    /// handle's type id selects.
    ///
    /// # Panics
    ///
    /// Panics if the carried type id is unregistered or the handle is
    /// stale or forged.
    pub fn dense_index_dyn<T: TypeKey>(&self, r: TypedRef<T, C>) -> u32 {
        self.dyn_entry(r.type_id()).arena.dense_index(r.raw())
    }

    /// Borrow the value named by `r` as a `T`, resolving through the
    /// type id the handle carries.
    ///
    /// # Safety
    ///
    /// The element stored in the selected arena must be layout-prefix
    /// compatible with `T` (see [`PolyArenas::iter_poly`]).
    ///
    /// # Panics
    ///
    /// Panics if the carried type id is unregistered or the handle is
    /// stale or forged.
    pub unsafe fn get_dyn<T: TypeKey>(&self, r: TypedRef<T, C>) -> &T {
        let entry = self.dyn_entry(r.type_id());
        debug_assert!(entry.arena.elem_size() >= mem::size_of::<T>());
        let ptr = entry.arena.get(r.raw());
        // SAFETY: the caller guarantees the stored type begins with T.
        unsafe { &*ptr.cast::<T>().as_ptr() }
    }

    /// Mutably borrow the value named by `r` as a `T`, resolving through
    /// the type id the handle carries.
    ///
    /// # Safety
    ///
    /// As for [`PolyArenas::get_dyn`].
    ///
    /// # Panics
    ///
    /// Panics if the carried type id is unregistered or the handle is
    /// stale or forged.
    pub unsafe fn get_dyn_mut<T: TypeKey>(&mut self, r: TypedRef<T, C>) -> &mut T {
        let entry = self.dyn_entry(r.type_id());
        debug_assert!(entry.arena.elem_size() >= mem::size_of::<T>());
        let ptr = entry.arena.get(r.raw());
        // SAFETY: the caller guarantees the stored type begins with T;
        // `&mut self` guarantees exclusivity.
        unsafe { &mut *ptr.cast::<T>().as_ptr() }
    }

    /// Borrow the value named by `r` as a `T`, or `None` if the carried
    /// type id is unregistered or the handle is stale or forged.
    ///
    /// # Safety
    ///
    /// As for [`PolyArenas::get_dyn`].
    pub unsafe fn try_get_dyn<T: TypeKey>(&self, r: TypedRef<T, C>) -> Option<&T> {
        let entry = match self.entries.get(r.type_id() as usize) {
            Some(Some(entry)) => entry,
            _ => return None,
        };
        let ptr = entry.arena.try_get(r.raw())?;
        // SAFETY: the caller guarantees the stored type begins with T.
        Some(unsafe { &*ptr.cast::<T>().as_ptr() })
    }

    /// Iterate over every live value whose type id lies in
    /// `[T::TYPE_ID, T::SUBTYPE_END)`, viewing each as a `T`.
    /// Unregistered ids in the range are skipped; the range is clamped
    /// to the table size.
    ///
    /// # Safety
    ///
    /// The type ids must form a contiguous pre-order numbering of the
    /// hierarchy rooted at `T`, and every type registered in the range
    /// must be layout-prefix compatible with `T` — e.g. `#[repr(C)]`
    /// with a leading `T` field — so that a reference to the element's
    /// first `size_of::<T>()` bytes is a valid `&T`.
    pub unsafe fn iter_poly<'a, T: TypeKey + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        self.subtype_entries::<T>().flat_map(|arena| {
            (0..arena.len()).map(move |dense| {
                // SAFETY: the caller guarantees every element in the
                // subtype range begins with T.
                unsafe { &*arena.item_ptr(dense).cast::<T>().as_ptr() }
            })
        })
    }

    /// Iterate over `(handle, value)` pairs across the subtype range of
    /// `T`, viewing each value as a `T`. Handles keep the subtype's own
    /// type id, so they resolve through the `_dyn` family.
    ///
    /// # Safety
    ///
    /// As for [`PolyArenas::iter_poly`].
    pub unsafe fn iter_poly_with_refs<'a, T: TypeKey + 'a>(
        &'a self,
    ) -> impl Iterator<Item = (TypedRef<T, C>, &'a T)> {
        self.subtype_entries::<T>().flat_map(|arena| {
            (0..arena.len()).map(move |dense| {
                let r = TypedRef::from_raw(arena.ref_at(dense));
                // SAFETY: as in `iter_poly`.
                let value = unsafe { &*arena.item_ptr(dense).cast::<T>().as_ptr() };
                (r, value)
            })
        })
    }

    fn subtype_entries<T: TypeKey>(&self) -> impl Iterator<Item = &RawArena<C>> {
        let begin = (T::TYPE_ID as usize).min(self.entries.len());
        let end = (T::SUBTYPE_END as usize).min(self.entries.len());
        self.entries[begin..end.max(begin)]
            .iter()
            .flatten()
            .map(|entry| &entry.arena)
    }

    fn dyn_entry(&self, type_id: u32) -> &PolyEntry<C> {
        match self.entries.get(type_id as usize) {
            Some(Some(entry)) => entry,
            _ => panic!("type id {type_id} is not registered"),
        }
    }
}

impl<C: HandleConfig> Drop for PolyArenas<C> {
    fn drop(&mut self) {
        for entry in self.entries.iter_mut().flatten() {
            if let Some(drop_fn) = entry.drop_fn {
                for dense in 0..entry.arena.len() {
                    // SAFETY: the shim was monomorphized for this
                    // arena's element type at registration; each live
                    // element is dropped exactly once, and the raw arena
                    // never touches the bytes afterwards.
                    unsafe { drop_fn(entry.arena.item_ptr(dense)) };
                }
            }
        }
    }
}

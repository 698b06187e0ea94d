//! World objects: the capability core every placed entity embeds.
//!
//! Instead of a deep inheritance chain, an entity type is a plain struct
//! that embeds an [`ObjectCore`] and implements two traits:
//!
//! - [`WorldObject`] exposes the core (and an optional per-tick hook) so
//!   managers can drive any entity through a `dyn` pointer.
//! - [`EntityClass`] is the constructor the factory dispatches. It runs
//!   twice per class: once in *describe* mode at registration, where each
//!   [`ObjectBuilder::new_component`] call records component metadata into
//!   the class's schema, and once per instance in *build* mode, where the
//!   same calls sub-allocate from the object's inline arena.
//!
//! The two-phase builder replaces the classic "constructor doubles as
//! schema discovery" trick with an explicit mode, while keeping the
//! single-constructor ergonomics: declare a component once, get both the
//! schema entry and the placed value.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::ptr::NonNull;
use std::rc::Weak;

use crate::arena::{ComponentArena, ComponentBox};
use crate::cdo::ClassDefaultObject;

// ---------------------------------------------------------------------------
// Pending-destroy notification
// ---------------------------------------------------------------------------

/// Address-identity handle for a placed object.
///
/// Placed objects never move, so their storage address identifies them for
/// the lifetime of the spawn.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(NonNull<u8>);

impl ObjectRef {
    pub(crate) fn new(addr: NonNull<u8>) -> Self {
        Self(addr)
    }

    /// The object's storage address.
    #[inline]
    pub fn addr(self) -> NonNull<u8> {
        self.0
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", self.0.as_ptr())
    }
}

/// Receiver for destroy requests.
///
/// An object holds a weak reference to its notifier and calls it exactly
/// once, on the false-to-true transition of its pending-destroy flag. The
/// actual teardown happens later, on the manager's sweep.
pub trait PendingDestroyNotifier {
    fn mark_pending_destroy(&self, object: ObjectRef);
}

// ---------------------------------------------------------------------------
// ObjectCore
// ---------------------------------------------------------------------------

/// State every world object carries: its inline component arena, tick
/// enablement, the pending-destroy flag, and free-form tags.
pub struct ObjectCore {
    /// Free-form labels attached to this object.
    pub tags: BTreeSet<String>,
    arena: ComponentArena,
    can_tick: bool,
    pending_destroy: bool,
    notifier: Option<Weak<dyn PendingDestroyNotifier>>,
    on_pending_destroy: Option<Box<dyn FnMut()>>,
    self_ref: Option<ObjectRef>,
}

impl ObjectCore {
    /// Whether this object ever ticks.
    #[inline]
    pub fn can_tick(&self) -> bool {
        self.can_tick
    }

    /// Whether a destroy has been requested.
    #[inline]
    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy
    }

    /// Request destruction.
    ///
    /// On the first call the notifier is informed and the user callback (if
    /// any) runs, in that order. Further calls are no-ops.
    pub fn set_pending_destroy(&mut self) {
        if self.pending_destroy {
            return;
        }
        self.pending_destroy = true;

        if let (Some(weak), Some(object)) = (&self.notifier, self.self_ref) {
            if let Some(notifier) = weak.upgrade() {
                notifier.mark_pending_destroy(object);
            }
        }
        if let Some(callback) = self.on_pending_destroy.as_mut() {
            callback();
        }
    }

    /// Install a callback that runs after the notifier on the first
    /// [`set_pending_destroy`](Self::set_pending_destroy).
    pub fn on_set_pending_destroy(&mut self, callback: impl FnMut() + 'static) {
        self.on_pending_destroy = Some(Box::new(callback));
    }

    /// Create a component on this object after construction.
    ///
    /// Components created here land in the inline window only if the
    /// declared components left room; otherwise they spill to the heap and
    /// lose locality. Prefer declaring components in the constructor.
    pub fn new_component<T>(&self, value: T) -> ComponentBox<T> {
        self.arena.alloc_component(value)
    }

    /// The object's inline arena.
    #[inline]
    pub fn arena(&self) -> &ComponentArena {
        &self.arena
    }

    /// This object's address handle, once placed.
    #[inline]
    pub fn object_ref(&self) -> Option<ObjectRef> {
        self.self_ref
    }

    /// Record the placement address. Called by the factory after the object
    /// is written into its storage.
    pub(crate) fn bind(&mut self, object: ObjectRef) {
        self.self_ref = Some(object);
    }
}

impl fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCore")
            .field("tags", &self.tags)
            .field("can_tick", &self.can_tick)
            .field("pending_destroy", &self.pending_destroy)
            .field("arena", &self.arena)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// WorldObject / EntityClass
// ---------------------------------------------------------------------------

/// Capability surface of a placed entity.
///
/// Managers hold `NonNull<dyn WorldObject>` and reach everything else
/// through the core.
pub trait WorldObject: Any {
    fn core(&self) -> &ObjectCore;
    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Per-frame hook; only driven for objects whose core reports
    /// [`can_tick`](ObjectCore::can_tick).
    fn tick(&mut self) {}
}

/// A registrable entity type: a single constructor the factory runs in both
/// describe and build mode.
pub trait EntityClass: WorldObject + Sized {
    fn construct(builder: &mut ObjectBuilder<'_>) -> Self;
}

// ---------------------------------------------------------------------------
// ObjectBuilder
// ---------------------------------------------------------------------------

enum BuildMode<'a> {
    /// Registration pass: component declarations feed the class schema.
    Describe {
        cdo: &'a mut ClassDefaultObject,
    },
    /// Instance pass: component declarations sub-allocate from the arena.
    Build,
}

/// Context handed to [`EntityClass::construct`].
pub struct ObjectBuilder<'a> {
    mode: BuildMode<'a>,
    arena: ComponentArena,
    notifier: Option<Weak<dyn PendingDestroyNotifier>>,
}

impl<'a> ObjectBuilder<'a> {
    /// Builder for the registration pass.
    pub(crate) fn describe(cdo: &'a mut ClassDefaultObject) -> Self {
        Self {
            mode: BuildMode::Describe { cdo },
            arena: ComponentArena::inert(),
            notifier: None,
        }
    }

    /// Builder for one instance, with its arena already spanning the tail.
    pub(crate) fn build(
        arena: ComponentArena,
        notifier: Option<Weak<dyn PendingDestroyNotifier>>,
    ) -> Self {
        Self {
            mode: BuildMode::Build,
            arena,
            notifier,
        }
    }

    /// Whether this run is the schema-discovery pass.
    pub fn is_describing(&self) -> bool {
        matches!(self.mode, BuildMode::Describe { .. })
    }

    /// Declare and construct a component.
    ///
    /// In describe mode this records `T`'s layout in the class schema and
    /// heap-allocates a probe value; in build mode it places `value` in the
    /// object's inline window (heap on overflow).
    ///
    /// # Panics
    ///
    /// Panics in describe mode when `T` is zero-sized -- zero-sized types
    /// have no layout worth reserving and are rejected by the schema.
    pub fn new_component<T>(&mut self, value: T) -> ComponentBox<T> {
        match &mut self.mode {
            BuildMode::Describe { cdo } => {
                cdo.register_component_of::<T>();
                ComponentBox::on_heap(value)
            }
            BuildMode::Build => self.arena.alloc_component(value),
        }
    }

    /// Produce the [`ObjectCore`] for the object under construction.
    ///
    /// Call this last, after declaring every component, and store the
    /// result in the object -- an entity struct cannot be built without it.
    pub fn finish(&mut self, can_tick: bool) -> ObjectCore {
        ObjectCore {
            tags: BTreeSet::new(),
            arena: self.arena.clone(),
            can_tick,
            pending_destroy: false,
            notifier: self.notifier.clone(),
            on_pending_destroy: None,
            self_ref: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

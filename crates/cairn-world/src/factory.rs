//! The type-name entity factory.
//!
//! Classes register under a string name. Registration runs the class
//! constructor once in describe mode to discover its component schema (the
//! class default object), and stores a monomorphized closure that
//! placement-constructs instances into caller-supplied storage.
//!
//! The factory never owns object storage: spawning callers allocate
//! [`allocation_size`](ClassDefaultObject::allocation_size) bytes (from the
//! matrix allocator, a slab, or anywhere else), hand the pointer in, and
//! later destroy the object and release the storage themselves.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::arena::ComponentArena;
use crate::cdo::ClassDefaultObject;
use crate::object::{
    EntityClass, ObjectBuilder, ObjectRef, PendingDestroyNotifier, WorldObject,
};

// ---------------------------------------------------------------------------
// EntityFactory
// ---------------------------------------------------------------------------

/// Type-erased placement constructor: writes one instance into the given
/// storage, building components from the supplied arena, and returns it as
/// a world-object pointer.
type ConstructFn = Box<
    dyn Fn(
        NonNull<u8>,
        ComponentArena,
        &Rc<dyn PendingDestroyNotifier>,
    ) -> NonNull<dyn WorldObject>,
>;

struct ClassEntry {
    construct: ConstructFn,
    cdo: ClassDefaultObject,
}

/// Registry mapping class names to their constructor and schema.
#[derive(Default)]
pub struct EntityFactory {
    classes: HashMap<String, ClassEntry>,
}

impl EntityFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`.
    ///
    /// Runs `T::construct` once in describe mode; the components it
    /// declares become the class schema, and the probe instance is
    /// discarded.
    ///
    /// # Panics
    ///
    /// Panics when `name` is already registered.
    pub fn register_class<T: EntityClass + 'static>(&mut self, name: &str) {
        assert!(
            !self.classes.contains_key(name),
            "class '{name}' is already registered"
        );

        let mut cdo = ClassDefaultObject::new(std::mem::size_of::<T>(), std::mem::align_of::<T>());
        {
            let mut builder = ObjectBuilder::describe(&mut cdo);
            drop(T::construct(&mut builder));
        }

        let construct: ConstructFn = Box::new(move |storage, arena, notifier| {
            // Safety is inherited from `spawn_at`'s contract: `storage` is
            // valid, exclusive, aligned, and large enough for T plus its
            // component tail.
            let slot = storage.cast::<T>();
            unsafe {
                slot.as_ptr().write(T::construct(&mut ObjectBuilder::build(
                    arena,
                    Some(Rc::downgrade(notifier)),
                )));
                NonNull::from(&mut *slot.as_ptr() as &mut dyn WorldObject)
            }
        });

        tracing::debug!(
            class = name,
            size = cdo.class_size(),
            align = cdo.class_align(),
            components = cdo.components().len(),
            "registered entity class"
        );
        self.classes.insert(
            name.to_owned(),
            ClassEntry { construct, cdo },
        );
    }

    /// Placement-construct an instance of the class registered as `name`.
    ///
    /// Builds the object's inline arena over the tail of `storage`, runs
    /// the constructor in build mode, and records the storage address so
    /// the object can identify itself to the notifier. Ownership of the
    /// storage does not transfer: the caller must eventually run the
    /// object's destructor and release the storage.
    ///
    /// # Panics
    ///
    /// Panics when `name` is not registered or `storage` is not aligned to
    /// the class alignment.
    ///
    /// # Safety
    ///
    /// - `storage` must point to at least `allocation_size()` bytes (for
    ///   this class's schema) of valid, writable memory reserved for this
    ///   object until it is destroyed.
    /// - When the class declares components, the tail at `storage +
    ///   class_size` must be max-aligned.
    pub unsafe fn spawn_at(
        &self,
        storage: NonNull<u8>,
        notifier: &Rc<dyn PendingDestroyNotifier>,
        name: &str,
    ) -> NonNull<dyn WorldObject> {
        let entry = self.lookup(name);
        assert_eq!(
            storage.as_ptr() as usize % entry.cdo.class_align(),
            0,
            "spawn storage must be aligned to the class alignment"
        );

        // The arena must exist before the constructor runs: the components
        // it declares are carved from the tail window.
        let arena = unsafe { ComponentArena::new(storage, &entry.cdo) };
        let mut object = (entry.construct)(storage, arena, notifier);
        unsafe { object.as_mut() }
            .core_mut()
            .bind(ObjectRef::new(storage));
        object
    }

    /// The class default object registered under `name`.
    ///
    /// # Panics
    ///
    /// Panics when `name` is not registered.
    pub fn cdo(&self, name: &str) -> &ClassDefaultObject {
        &self.lookup(name).cdo
    }

    /// Whether `name` has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Number of registered classes.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Names of all registered classes, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    fn lookup(&self, name: &str) -> &ClassEntry {
        self.classes.get(name).unwrap_or_else(|| {
            panic!(
                "class '{}' is not registered. Registered classes: [{}]",
                name,
                self.class_names().join(", ")
            )
        })
    }
}

impl std::fmt::Debug for EntityFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityFactory")
            .field("classes", &self.class_names())
            .finish()
    }
}

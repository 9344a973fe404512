use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

// TbObj lets the user mutably share test objects (scoreboards, coverage databases, ...)
// between Tasks. Tasks of one simulation are all polled on the simulation thread, so
// Rc/RefCell are enough.
pub struct TbObj<T>(Rc<RefCell<T>>);

impl<T> TbObj<T> {
    pub fn new(data: T) -> TbObj<T> {
        TbObj(Rc::new(RefCell::new(data)))
    }
    pub fn get(&self) -> Ref<'_, T> {
        (*self.0).borrow()
    }
    pub fn get_mut(&self) -> RefMut<'_, T> {
        (*self.0).borrow_mut()
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get_mut())
    }
}

impl<T> Clone for TbObj<T> {
    fn clone(&self) -> Self {
        TbObj(self.0.clone())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for TbObj<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TbObj").field(&*self.get()).finish()
    }
}

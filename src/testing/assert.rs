//! Value inspection behind the runner's nil and containment assertions

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

/// Values that can be "nil"
///
/// Wrappers delegate to what they hold, so an empty `Option` inside a
/// `Box`, `Rc`, `Arc` or reference still counts as nil.
pub trait Nullable {
    fn is_nil(&self) -> bool;
}

impl<T> Nullable for Option<T> {
    fn is_nil(&self) -> bool {
        self.is_none()
    }
}

impl Nullable for Value {
    fn is_nil(&self) -> bool {
        self.is_null()
    }
}

impl<T: ?Sized> Nullable for *const T {
    fn is_nil(&self) -> bool {
        self.is_null()
    }
}

impl<T: ?Sized> Nullable for *mut T {
    fn is_nil(&self) -> bool {
        self.is_null()
    }
}

impl<T: Nullable + ?Sized> Nullable for Box<T> {
    fn is_nil(&self) -> bool {
        (**self).is_nil()
    }
}

impl<T: Nullable + ?Sized> Nullable for Rc<T> {
    fn is_nil(&self) -> bool {
        (**self).is_nil()
    }
}

impl<T: Nullable + ?Sized> Nullable for Arc<T> {
    fn is_nil(&self) -> bool {
        (**self).is_nil()
    }
}

impl<T: Nullable + ?Sized> Nullable for &T {
    fn is_nil(&self) -> bool {
        (**self).is_nil()
    }
}

/// Containers that can be searched for an item
///
/// Strings search for substrings; sequences search element by element
/// with `PartialEq`, so nested values compare structurally.
pub trait Contains<Item: ?Sized> {
    fn contains_item(&self, item: &Item) -> bool;
}

impl Contains<str> for str {
    fn contains_item(&self, item: &str) -> bool {
        self.contains(item)
    }
}

impl Contains<char> for str {
    fn contains_item(&self, item: &char) -> bool {
        self.contains(*item)
    }
}

impl Contains<str> for String {
    fn contains_item(&self, item: &str) -> bool {
        self.as_str().contains(item)
    }
}

impl Contains<char> for String {
    fn contains_item(&self, item: &char) -> bool {
        self.as_str().contains(*item)
    }
}

impl<T, I> Contains<I> for [T]
where
    T: PartialEq<I>,
    I: ?Sized,
{
    fn contains_item(&self, item: &I) -> bool {
        self.iter().any(|v| v == item)
    }
}

impl<T, I, const N: usize> Contains<I> for [T; N]
where
    T: PartialEq<I>,
    I: ?Sized,
{
    fn contains_item(&self, item: &I) -> bool {
        self.as_slice().contains_item(item)
    }
}

impl<T, I> Contains<I> for Vec<T>
where
    T: PartialEq<I>,
    I: ?Sized,
{
    fn contains_item(&self, item: &I) -> bool {
        self.as_slice().contains_item(item)
    }
}

impl<T, I> Contains<I> for VecDeque<T>
where
    T: PartialEq<I>,
    I: ?Sized,
{
    fn contains_item(&self, item: &I) -> bool {
        self.iter().any(|v| v == item)
    }
}

impl<T, I, S> Contains<I> for HashSet<T, S>
where
    T: PartialEq<I> + Eq + Hash,
    I: ?Sized,
{
    fn contains_item(&self, item: &I) -> bool {
        self.iter().any(|v| v == item)
    }
}

/// Dynamic containers: a string holds substrings, an array holds elements
impl Contains<Value> for Value {
    fn contains_item(&self, item: &Value) -> bool {
        match (self, item) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(values), _) => values.iter().any(|v| v == item),
            _ => false,
        }
    }
}

impl Contains<str> for Value {
    fn contains_item(&self, item: &str) -> bool {
        match self {
            Value::String(haystack) => haystack.contains(item),
            Value::Array(values) => values.iter().any(|v| v == item),
            _ => false,
        }
    }
}

impl Contains<String> for Value {
    fn contains_item(&self, item: &String) -> bool {
        self.contains_item(item.as_str())
    }
}

/// Scalars are searched among array elements, like in a typed `Vec`
macro_rules! contains_scalar {
    ($($ty:ty)*) => {
        $(
            impl Contains<$ty> for Value {
                fn contains_item(&self, item: &$ty) -> bool {
                    match self {
                        Value::Array(values) => values.iter().any(|v| v == item),
                        _ => false,
                    }
                }
            }
        )*
    };
}

contains_scalar! { i8 i16 i32 i64 isize u8 u16 u32 u64 usize f32 f64 bool }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nil_through_wrappers() {
        let none: Option<i32> = None;
        assert!(none.is_nil());
        assert!(Box::new(none).is_nil());
        assert!(Arc::new(Box::new(none)).is_nil());
        assert!((&none).is_nil());
        assert!(!Some(0).is_nil());
        assert!(!Box::new(Some("x")).is_nil());
    }

    #[test]
    fn test_nil_trait_object() {
        let boxed: Box<dyn Nullable> = Box::new(None::<String>);
        assert!(boxed.is_nil());
        let boxed: Box<dyn Nullable> = Box::new(Some(String::new()));
        assert!(!boxed.is_nil());
    }

    #[test]
    fn test_nil_dynamic_values() {
        assert!(json!(null).is_nil());
        assert!(serde_json::to_value(None::<i64>).unwrap().is_nil());
        assert!(!json!(0).is_nil());
        assert!(!json!([]).is_nil());
    }

    #[test]
    fn test_nil_pointers() {
        let p: *const u8 = std::ptr::null();
        assert!(p.is_nil());
        let x = 1u8;
        assert!(!(&x as *const u8).is_nil());
    }

    #[test]
    fn test_string_containment() {
        assert!("hello world".contains_item("world"));
        assert!(!"hello world".contains_item("foo"));
        assert!("hello".contains_item(&'e'));
        assert!(String::from("abc").contains_item("bc"));
    }

    #[test]
    fn test_sequence_containment() {
        let words = vec!["hello", "world", "test"];
        assert!(words.contains_item(&"hello"));
        assert!(!words.contains_item(&"foo"));

        let owned = vec!["a".to_string(), "b".to_string()];
        assert!(owned.contains_item("b"));

        let nested = vec![vec![1, 2], vec![3]];
        assert!(nested.contains_item(&vec![3]));
        assert!([1, 2, 3].contains_item(&2));
        assert!(VecDeque::from(vec![4, 5]).contains_item(&5));
        assert!(HashSet::from([7]).contains_item(&7));
    }

    #[test]
    fn test_dynamic_containment() {
        let erased = vec![json!("a"), json!("b")];
        assert!(erased.contains_item("b"));
        assert!(json!(["a", "b"]).contains_item("b"));
        assert!(json!([[1, 2], [3]]).contains_item(&json!([3])));
        assert!(json!("hello world").contains_item(&json!("world")));
        assert!(!json!({"a": 1}).contains_item("a"));
        assert!(!json!(42).contains_item(&json!(4)));
    }

    #[test]
    fn test_dynamic_scalar_containment() {
        assert!(json!([1, 2]).contains_item(&2));
        assert!(json!([1.5, 2.5]).contains_item(&2.5));
        assert!(json!([true]).contains_item(&true));
        assert!(!json!([1, 2]).contains_item(&3u64));
        assert!(!json!(2).contains_item(&2));
        assert!(json!(["a"]).contains_item(&"a".to_string()));
    }
}

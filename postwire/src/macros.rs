//! Macros for declaring message types and typed callers.
//!
//! - [`messages!`]: derive Serialize, Deserialize, Debug, Clone, PartialEq for bodies
//! - [`callers!`]: a struct whose methods each issue a typed call on a fixed path
//!
//! # Example
//!
//! ```rust,ignore
//! use postwire::{callers, messages};
//!
//! messages! {
//!     /// Request to add two numbers
//!     pub struct AddRequest {
//!         pub a: i64,
//!         pub b: i64,
//!     }
//! }
//!
//! callers! {
//!     /// Calculator on the remote peer
//!     pub struct Calculator {
//!         /// Sum of both operands
//!         fn add(AddRequest) -> i64 = "calc.add";
//!     }
//! }
//!
//! let calculator = Calculator::connect(transport);
//! let sums = calculator.add(&AddRequest { a: 1, b: 2 }).try_collect_all().await?;
//! ```

/// Define message body types with the derives the protocol needs.
///
/// Each struct gets `#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]`.
/// The calling crate must depend on `serde`.
#[macro_export]
macro_rules! messages {
    (
        $(
            $(#[$meta:meta])*
            $vis:vis struct $name:ident {
                $(
                    $(#[$field_meta:meta])*
                    $field_vis:vis $field:ident : $ty:ty
                ),* $(,)?
            }
        )*
    ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
            $vis struct $name {
                $(
                    $(#[$field_meta])*
                    $field_vis $field : $ty,
                )*
            }
        )*
    };
}

/// Define a typed caller.
///
/// Generates a struct wrapping a shared [`MessageClient`](crate::MessageClient)
/// with one method per entry. Each method sends its request on the given path
/// and returns a [`TypedCallStream`](crate::TypedCallStream) of the response
/// type.
///
/// # Example
///
/// ```rust,ignore
/// callers! {
///     /// Remote greeter
///     pub struct Greeter {
///         /// One greeting per name
///         fn greet(String) -> String = "greet";
///         /// Greetings until the count runs out
///         fn countdown(u32) -> String = "countdown";
///     }
/// }
/// ```
#[macro_export]
macro_rules! callers {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$method_meta:meta])*
                fn $method:ident ( $req:ty ) -> $resp:ty = $path:literal
            );* $(;)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<T, C = $crate::JsonCodec>
        where
            T: $crate::CallerTransport,
            C: $crate::MessageCodec,
        {
            client: ::std::rc::Rc<$crate::MessageClient<T, C>>,
        }

        impl<T> $name<T>
        where
            T: $crate::CallerTransport,
        {
            /// Build a caller over `transport` with the JSON codec.
            pub fn connect(transport: T) -> Self {
                Self::new(::std::rc::Rc::new($crate::MessageClient::new(transport)))
            }
        }

        impl<T, C> $name<T, C>
        where
            T: $crate::CallerTransport,
            C: $crate::MessageCodec,
        {
            /// Paths this caller issues requests on.
            pub const PATHS: &'static [&'static str] = &[$($path),*];

            /// Wrap a shared client.
            pub fn new(client: ::std::rc::Rc<$crate::MessageClient<T, C>>) -> Self {
                Self { client }
            }

            /// The wrapped client.
            pub fn client(&self) -> &$crate::MessageClient<T, C> {
                &self.client
            }

            $(
                $(#[$method_meta])*
                pub fn $method(&self, request: &$req) -> $crate::TypedCallStream<$resp, C> {
                    self.client.call_typed($path, request)
                }
            )*
        }

        impl<T, C> ::std::clone::Clone for $name<T, C>
        where
            T: $crate::CallerTransport,
            C: $crate::MessageCodec,
        {
            fn clone(&self) -> Self {
                Self {
                    client: ::std::rc::Rc::clone(&self.client),
                }
            }
        }
    };
}

/// Declares a remotely callable interface.
///
/// ```ignore
/// remote_interface! {
///     pub trait Calc => CalcClient {
///         fn add(a: i32, b: i32) -> i32;
///     }
/// }
/// ```
///
/// expands to
///
/// * the trait `Calc`, whose methods take `&self` and return
///   `Result<T, RemoteFailure>`, with a provided `dispatch_table()` that
///   registers every method under its name and stringified parameter types
///   (whitespace is dropped from those descriptors on both sides, so stubs
///   and tables built by different compilers still match);
/// * `CalcClient`, a cloneable stub around a [`ClientInterceptor`](crate::ClientInterceptor)
///   whose methods return `httpinvoker::Result<T>`. Its `Display` impl is
///   answered locally with the service URL.
#[macro_export]
macro_rules! remote_interface {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident => $client:ident {
            $(
                $(#[$fn_meta:meta])*
                fn $method:ident ( $( $arg:ident : $arg_ty:ty ),* $(,)? ) -> $ret:ty ;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis trait $name {
            $(
                $(#[$fn_meta])*
                fn $method(&self $(, $arg: $arg_ty)*) -> ::std::result::Result<$ret, $crate::RemoteFailure>;
            )*

            fn dispatch_table() -> $crate::DispatchTable<Self>
            where
                Self: Sized + 'static,
            {
                let mut table = $crate::DispatchTable::new();
                $(
                    table.register(
                        stringify!($method),
                        &[$(stringify!($arg_ty)),*],
                        |__target: &Self, __arguments: ::std::vec::Vec<$crate::Value>| {
                            #[allow(unused_mut, unused_variables)]
                            let mut __arguments = __arguments.into_iter();
                            $(
                                let $arg: $arg_ty = $crate::next_argument(&mut __arguments)?;
                            )*
                            $crate::InvocationResult::from_outcome(__target.$method($($arg),*))
                        },
                    );
                )*
                table
            }
        }

        #[derive(Debug, Clone)]
        $vis struct $client {
            interceptor: $crate::ClientInterceptor,
        }

        #[allow(dead_code)]
        impl $client {
            pub fn new(interceptor: $crate::ClientInterceptor) -> Self {
                $client { interceptor }
            }

            pub fn connect<S: Into<String>>(service_url: S) -> $crate::Result<Self> {
                Ok($client::new($crate::ClientInterceptor::connect(service_url)?))
            }

            pub fn interceptor(&self) -> &$crate::ClientInterceptor {
                &self.interceptor
            }

            $(
                $(#[$fn_meta])*
                pub fn $method(&self $(, $arg: $arg_ty)*) -> $crate::Result<$ret> {
                    let arguments = vec![$($crate::to_argument(&$arg)?),*];
                    self.interceptor
                        .invoke(stringify!($method), &[$(stringify!($arg_ty)),*], arguments)
                }
            )*
        }

        impl ::std::fmt::Display for $client {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self
                    .interceptor
                    .invoke::<::std::string::String>($crate::TO_STRING, &[], ::std::vec::Vec::new())
                {
                    Ok(description) => f.write_str(&description),
                    Err(_) => Err(::std::fmt::Error),
                }
            }
        }
    };
}

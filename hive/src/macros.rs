//! Macros declaring proxyable service interfaces and pipeline filter interfaces.

/// Declares a service interface trait and generates its proxies.
///
/// The trait gets `Send + Sync + 'static` supertraits and
/// [`ServiceInterface`](crate::ServiceInterface) is implemented for
/// `dyn Trait`. Methods must take `&self`, have no generic parameters and
/// return a `'static` type.
///
/// With a leading `#[default_impl]`, a no-op implementation returning
/// `Default::default()` from every method is generated as well
/// ([`DefaultImplementation`](crate::DefaultImplementation)); all return types
/// must then implement `Default`.
///
/// ```
/// use fibre_hive::{service_interface, DefaultImplementation};
///
/// service_interface! {
///   #[default_impl]
///   pub trait Calculator {
///     fn run(&self, input: i64) -> i64;
///   }
/// }
///
/// let calculator = <dyn Calculator>::default_implementation();
/// assert_eq!(calculator.run(5), 0);
/// ```
#[macro_export]
macro_rules! service_interface {
  (@impls dyn $name:ident {
    $( fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?; )*
  }) => {
    const _: () = {
      struct Delegate(::std::sync::Arc<dyn $crate::Dispatch<dyn $name>>);

      impl $name for Delegate {
        $(
          fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
            $crate::proxy::__private::target(&*self.0).$method($($arg),*)
          }
        )*
      }

      struct Intercepted {
        target: ::std::sync::Arc<dyn $name>,
        interceptor: ::std::sync::Arc<dyn $crate::MethodInterceptor>,
      }

      impl $name for Intercepted {
        $(
          fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
            let call = $crate::MethodCall::new(
              ::std::stringify!($method),
              &[$(::std::stringify!($arg)),*],
            );
            let target = &self.target;
            let result = self.interceptor.invoke(
              &call,
              ::std::boxed::Box::new(move || {
                ::std::boxed::Box::new(target.$method($($arg),*))
                  as ::std::boxed::Box<dyn ::std::any::Any>
              }),
            );
            $crate::proxy::__private::downcast_return(result, &call)
          }
        )*
      }

      impl $crate::ServiceInterface for dyn $name {
        fn interface_name() -> &'static str {
          ::std::concat!(::std::module_path!(), "::", ::std::stringify!($name))
        }

        fn delegate(
          dispatch: ::std::sync::Arc<dyn $crate::Dispatch<Self>>,
        ) -> ::std::sync::Arc<Self> {
          ::std::sync::Arc::new(Delegate(dispatch))
        }

        fn intercept(
          target: ::std::sync::Arc<Self>,
          interceptor: ::std::sync::Arc<dyn $crate::MethodInterceptor>,
        ) -> ::std::sync::Arc<Self> {
          ::std::sync::Arc::new(Intercepted { target, interceptor })
        }
      }
    };
  };

  (@default dyn $name:ident {
    $( fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?; )*
  }) => {
    const _: () = {
      struct Unterminated;

      impl $name for Unterminated {
        $(
          fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
            let _ = ($($arg,)*);
            ::std::default::Default::default()
          }
        )*
      }

      impl $crate::DefaultImplementation for dyn $name {
        fn default_implementation() -> ::std::sync::Arc<Self> {
          ::std::sync::Arc::new(Unterminated)
        }
      }
    };
  };

  (
    #[default_impl]
    $(#[$meta:meta])*
    $vis:vis trait $name:ident {
      $(
        $(#[$fmeta:meta])*
        fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?;
      )*
    }
  ) => {
    $crate::service_interface! {
      $(#[$meta])*
      $vis trait $name {
        $( $(#[$fmeta])* fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?; )*
      }
    }
    $crate::service_interface! {
      @default dyn $name { $( fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?; )* }
    }
  };

  (
    $(#[$meta:meta])*
    $vis:vis trait $name:ident {
      $(
        $(#[$fmeta:meta])*
        fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?;
      )*
    }
  ) => {
    $(#[$meta])*
    $vis trait $name: ::std::marker::Send + ::std::marker::Sync + 'static {
      $( $(#[$fmeta])* fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?; )*
    }
    $crate::service_interface! {
      @impls dyn $name { $( fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?; )* }
    }
  };
}

/// Declares the filter interface of a pipeline service.
///
/// Each filter method mirrors a method of the service interface with one extra
/// trailing `next: &dyn Service` parameter, the remainder of the pipeline.
/// The service interface must have been declared with `#[default_impl]`, the
/// generated default being the fallback terminator.
///
/// ```
/// use fibre_hive::{pipeline_filter, service_interface};
///
/// service_interface! {
///   #[default_impl]
///   pub trait Calculator {
///     fn run(&self, input: i64) -> i64;
///   }
/// }
///
/// pipeline_filter! {
///   pub trait CalculatorFilter for Calculator {
///     fn run(&self, input: i64) -> i64;
///   }
/// }
///
/// struct AddThree;
/// impl CalculatorFilter for AddThree {
///   fn run(&self, input: i64, next: &dyn Calculator) -> i64 {
///     next.run(input + 3)
///   }
/// }
/// ```
#[macro_export]
macro_rules! pipeline_filter {
  (
    $(#[$meta:meta])*
    $vis:vis trait $filter:ident for $service:ident {
      $(
        $(#[$fmeta:meta])*
        fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?;
      )*
    }
  ) => {
    $(#[$meta])*
    $vis trait $filter: ::std::marker::Send + ::std::marker::Sync + 'static {
      $( $(#[$fmeta])* fn $method(&self $(, $arg: $arg_ty)*, next: &dyn $service) $(-> $ret)?; )*
    }

    $crate::service_interface! {
      @impls dyn $filter { $( fn $method(&self $(, $arg: $arg_ty)*, next: &dyn $service) $(-> $ret)?; )* }
    }

    const _: () = {
      struct Bridge {
        filter: ::std::sync::Arc<dyn $filter>,
        next: ::std::sync::Arc<dyn $service>,
      }

      impl $service for Bridge {
        $(
          fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
            self.filter.$method($($arg,)* &*self.next)
          }
        )*
      }

      impl $crate::PipelineService for dyn $service {
        type Filter = dyn $filter;

        fn bridge(
          filter: ::std::sync::Arc<dyn $filter>,
          next: ::std::sync::Arc<dyn $service>,
        ) -> ::std::sync::Arc<Self> {
          ::std::sync::Arc::new(Bridge { filter, next })
        }
      }
    };
  };
}

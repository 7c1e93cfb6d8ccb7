//! Payload type of a handler's return value.

use super::params::JSON;
use crate::introspect::TypeRef;

/// Return types that carry no typed payload.
const NO_PAYLOAD: &[&str] = &["HttpResponse", "Response", "StatusCode"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Payload<'t> {
    /// `None` when nothing typed is returned.
    pub ty: Option<&'t TypeRef>,
    /// Content type implied by a wrapper such as `Json<T>`.
    pub implied_format: Option<&'static str>,
}

/// Peels `Result<T, E>`, `Json<T>` and tuples (keeping the last element,
/// as in `(StatusCode, Json<T>)`) until none applies.
pub(crate) fn payload(output: Option<&TypeRef>) -> Payload<'_> {
    let mut implied_format = None;
    let Some(mut ty) = output else {
        return Payload {
            ty: None,
            implied_format,
        };
    };

    loop {
        match ty {
            TypeRef::Named { name, args } if name == "Result" && !args.is_empty() => ty = &args[0],
            TypeRef::Named { name, args } if name == "Json" && args.len() == 1 => {
                implied_format = Some(JSON);
                ty = &args[0];
            }
            TypeRef::Tuple(elems) if !elems.is_empty() => ty = &elems[elems.len() - 1],
            _ => break,
        }
    }

    let empty = match ty {
        TypeRef::Tuple(elems) => elems.is_empty(),
        TypeRef::Opaque(_) => true,
        TypeRef::Named { name, .. } => NO_PAYLOAD.contains(&name.as_str()),
        TypeRef::Slice(_) => false,
    };

    Payload {
        ty: (!empty).then_some(ty),
        implied_format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> TypeRef {
        TypeRef::named(name)
    }

    fn generic(name: &str, args: Vec<TypeRef>) -> TypeRef {
        TypeRef::generic(name, args)
    }

    #[test]
    fn test_wrappers_are_peeled() {
        let ty = generic(
            "Result",
            vec![
                TypeRef::Tuple(vec![
                    named("StatusCode"),
                    generic("Json", vec![generic("Vec", vec![named("Account")])]),
                ]),
                named("ApiError"),
            ],
        );

        let payload = payload(Some(&ty));
        assert_eq!(payload.ty.map(|t| t.to_string()).as_deref(), Some("Vec<Account>"));
        assert_eq!(payload.implied_format, Some(JSON));
    }

    #[test]
    fn test_plain_type_has_no_implied_format() {
        let ty = named("String");
        let payload = payload(Some(&ty));
        assert_eq!(payload.ty, Some(&ty));
        assert_eq!(payload.implied_format, None);
    }

    #[test]
    fn test_no_payload() {
        let cases = [
            TypeRef::unit(),
            named("HttpResponse"),
            generic("Result", vec![named("StatusCode"), named("Error")]),
            generic("Result", vec![TypeRef::unit(), named("Error")]),
            TypeRef::Opaque("Responder".to_string()),
        ];
        for ty in &cases {
            assert_eq!(payload(Some(ty)).ty, None, "{}", ty);
        }
        assert_eq!(payload(None).ty, None);
    }
}

/// Implements [`apollo_compiler::resolvers::ObjectValue`] with reduced boilerplate
///
/// Define:
///
/// * The implementing Rust type
/// * The __typename string
/// * One arm per field, keyed by the field name as it appears in the schema.
///   - Binds the resolver (which must be spelled something else than `self` because macros)
///     and optionally the `ResolveInfo` of the field.
///   - Evaluates to `Result<ResolvedValue, FieldError>`, `Err` is turned into a field error
macro_rules! impl_resolver {
    (
        for $ty: ty:
        __typename = $type_name: expr;
        $(
            $field_name: literal => |$self_: ident $(, $info: ident)?| $body: expr
        ),* $(,)?
    ) => {
        impl apollo_compiler::resolvers::ObjectValue for $ty {
            fn type_name(&self) -> &str {
                $type_name
            }

            fn resolve_field<'a>(
                &'a self,
                info: &'a apollo_compiler::resolvers::ResolveInfo<'a>,
            ) -> Result<
                apollo_compiler::resolvers::ResolvedValue<'a>,
                apollo_compiler::resolvers::FieldError,
            > {
                match info.field_name() {
                    $(
                        $field_name => {
                            #[allow(unused_variables)]
                            let $self_ = self;
                            $( let $info = info; )?
                            $body
                        }
                    )*
                    _ => Err(apollo_compiler::resolvers::ObjectValue::unknown_field_error(
                        self, info,
                    )),
                }
            }
        }
    };
}

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type BoxedResult<T> = std::result::Result<T, BoxedError>;

pub trait IntoBoxedError {
    fn into_boxed_error(self) -> BoxedError;
}

impl<E> IntoBoxedError for E
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_boxed_error(self) -> BoxedError {
        Box::new(self)
    }
}

pub(crate) mod script;
pub(crate) mod summary;

pub(crate) use self::script::Edit;
pub(crate) use self::summary::Summary;

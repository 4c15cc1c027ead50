pub(crate) mod decode;
pub(crate) mod publicize;
pub(crate) mod show;

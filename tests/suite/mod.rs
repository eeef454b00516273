mod history;
mod limits;
mod session;
mod suggestion;

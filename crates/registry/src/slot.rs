/// Typed key for one logical service.
///
/// ```ignore
/// pub struct UserSlot;
///
/// impl ServiceSlot for UserSlot {
///     type Service = dyn UserService;
///     const NAME: &'static str = "users";
/// }
/// ```
pub trait ServiceSlot: 'static {
    type Service: ?Sized + Send + Sync + 'static;

    /// Name used in logs and errors.
    const NAME: &'static str;
}

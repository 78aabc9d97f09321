/// Same as `approx::assert_ulps_eq!`, but on failure prints a colored diff of the pretty-printed values
#[macro_export]
macro_rules! pretty_assert_ulps_eq {
  ($left:expr, $right:expr $(, $opt:ident = $val:expr)* $(,)?) => {{
    let (left, right) = (&$left, &$right);
    if !approx::ulps_eq!(left, right $(, $opt = $val)*) {
      pretty_assertions::assert_eq!(format!("{:#?}", left), format!("{:#?}", right));
      panic!("assertion failed: `ulps_eq!(left, right)`: values differ beyond their printed precision");
    }
  }};
}
